// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagewerk orchestration: per-run scratch space, bounded page concurrency,
// timeouts and cancellation, and the cache-fronted enhancement service.

pub mod cancel;
pub mod orchestrator;
pub mod service;
pub mod workspace;

#[cfg(test)]
mod test_support;

pub use cancel::{CancelToken, guarded};
pub use orchestrator::DocumentOrchestrator;
pub use service::{EnhanceOutcome, EnhancementService, artifact_name};
pub use workspace::RunWorkspace;
