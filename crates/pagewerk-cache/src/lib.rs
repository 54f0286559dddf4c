// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagewerk cache: content digests and the persistent digest → artifact index
// that lets repeated submissions skip the pipeline entirely.

pub mod index;
pub mod integrity;

pub use index::{CacheEntry, ContentCache, INDEX_FILE_NAME};
pub use integrity::{DIGEST_HEX_LEN, Digest, digest_bytes, digest_file};
