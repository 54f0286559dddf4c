// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cooperative cancellation and the timeout/cancellation guard wrapped around
// every collaborator call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pagewerk_core::error::{PagewerkError, Result};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Cloneable cancellation signal shared by a caller and a running request.
///
/// Cancelling is sticky: once cancelled, every clone reports cancelled and
/// every pending [`CancelToken::cancelled`] future completes.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        if !self.sender.send_replace(true) {
            debug!("Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // The sender lives as long as any clone, so this cannot complete.
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `work` bounded by `limit` and raced against `cancel`.
///
/// Losing either race drops `work`, which for child-process collaborators
/// also kills the child.
pub async fn guarded<T>(
    operation: &str,
    limit: Duration,
    cancel: &CancelToken,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(PagewerkError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(operation, "Cancelled while in flight");
            Err(PagewerkError::Cancelled)
        }
        outcome = tokio::time::timeout(limit, work) => match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, secs = limit.as_secs(), "Collaborator call timed out");
                Err(PagewerkError::Timeout {
                    operation: operation.to_owned(),
                    secs: limit.as_secs(),
                })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn guarded_passes_result_through() {
        let token = CancelToken::new();
        let value = guarded("noop", Duration::from_secs(1), &token, async { Ok(7) })
            .await
            .expect("value");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn guarded_times_out() {
        let token = CancelToken::new();
        let result: Result<()> = guarded("slow", Duration::from_millis(20), &token, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(PagewerkError::Timeout { .. })));
    }

    #[tokio::test]
    async fn guarded_observes_cancellation() {
        let token = CancelToken::new();
        let remote = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            remote.cancel();
        });
        let result: Result<()> = guarded("stuck", Duration::from_secs(30), &token, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(PagewerkError::Cancelled)));
    }

    #[tokio::test]
    async fn already_cancelled_skips_work() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let token = CancelToken::new();
        token.cancel();
        let polled = AtomicBool::new(false);
        let result = guarded("never", Duration::from_secs(1), &token, async {
            polled.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(PagewerkError::Cancelled)));
        assert!(!polled.load(Ordering::SeqCst));
    }
}
