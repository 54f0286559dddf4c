// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page image encode/decode helpers.

pub mod codec;

pub use codec::{decode_page, encode_png, load_page, save_png};
