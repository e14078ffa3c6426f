//! Deadline and cancellation guard for remote calls
//!
//! Every call into the document store or blob store runs through
//! [`RemoteGuard::run`], which bounds it by a deadline and aborts it when the
//! owning [`Affordance`] is cancelled or dropped.

use crate::error::PantryError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Owner side of a cancellation signal
///
/// Tie one to the lifetime of a UI affordance (an open form, a running
/// command). Cancelling it, or dropping it, cancels every derived token.
#[derive(Debug)]
pub struct Affordance {
    tx: watch::Sender<bool>,
}

impl Affordance {
    /// Create a live affordance
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Token observing this affordance
    #[inline]
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: Some(self.tx.subscribe()),
        }
    }

    /// Cancel all derived tokens
    #[inline]
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Affordance {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a cancellation signal
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// Token that is never cancelled
    #[inline]
    #[must_use]
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Whether cancellation was requested or the affordance dropped
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match &self.rx {
            None => false,
            Some(rx) => *rx.borrow() || rx.has_changed().is_err(),
        }
    }

    /// Resolve once cancelled; pending forever for [`CancelToken::never`]
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Deadline plus cancellation applied to remote calls
#[derive(Debug, Clone)]
pub struct RemoteGuard {
    deadline: Duration,
    cancel: CancelToken,
}

impl RemoteGuard {
    /// Guard with a deadline and no cancellation
    #[inline]
    #[must_use]
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            cancel: CancelToken::never(),
        }
    }

    /// With cancellation token
    #[inline]
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run a remote call under this guard
    ///
    /// # Errors
    /// - `PantryError::Cancelled` if the token fires first
    /// - `PantryError::Timeout` if the deadline elapses first
    /// - whatever the call itself returns
    pub async fn run<T, F>(&self, operation: &str, call: F) -> Result<T, PantryError>
    where
        F: Future<Output = Result<T, PantryError>>,
    {
        if self.cancel.is_cancelled() {
            info!(operation, "skipping remote call, already cancelled");
            return Err(PantryError::Cancelled {
                operation: operation.to_string(),
            });
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                info!(operation, "remote call cancelled");
                Err(PantryError::Cancelled { operation: operation.to_string() })
            }
            outcome = tokio::time::timeout(self.deadline, call) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    let duration_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX);
                    warn!(operation, duration_ms, "remote call timed out");
                    Err(PantryError::Timeout { operation: operation.to_string(), duration_ms })
                }
            },
        }
    }
}

impl Default for RemoteGuard {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_result() {
        let guard = RemoteGuard::new(Duration::from_secs(1));
        let value = guard.run("add", async { Ok::<_, PantryError>(2 + 2) }).await.unwrap();
        assert_eq!(value, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_elapses_into_timeout() {
        let guard = RemoteGuard::new(Duration::from_millis(50));
        let result = guard
            .run("list inventory", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, PantryError>(())
            })
            .await;

        match result {
            Err(PantryError::Timeout { operation, duration_ms }) => {
                assert_eq!(operation, "list inventory");
                assert_eq!(duration_ms, 50);
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_aborts_in_flight_call() {
        let affordance = Affordance::new();
        let guard = RemoteGuard::new(Duration::from_secs(60)).with_cancel(affordance.token());

        let call = guard.run("upload Milk", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, PantryError>(())
        });
        let cancel = async {
            tokio::task::yield_now().await;
            affordance.cancel();
        };

        let (result, ()) = tokio::join!(call, cancel);
        assert!(matches!(result, Err(PantryError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn dropping_affordance_cancels() {
        let affordance = Affordance::new();
        let token = affordance.token();
        assert!(!token.is_cancelled());

        drop(affordance);
        assert!(token.is_cancelled());

        let guard = RemoteGuard::default().with_cancel(token);
        let result = guard.run("get Milk", async { Ok::<_, PantryError>(()) }).await;
        assert!(matches!(result, Err(PantryError::Cancelled { .. })));
    }

    #[test]
    fn never_token_is_not_cancelled() {
        assert!(!CancelToken::never().is_cancelled());
    }
}
