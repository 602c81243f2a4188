//! Retry-until-condition primitive shared by every long-running step.
//!
//! ```text
//! loop:
//!   sleep(interval)            ← cancellable
//!   check()  ── Satisfied ───▶ Ok
//!            ── Failed(e) ───▶ Err(e), no further sleep
//!            ── Pending(s) ──▶ log s; give up after max_attempts
//! ```

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{FailoverError, Result};

/// Outcome of one status check.
#[derive(Debug)]
pub enum PollStatus {
    Satisfied,
    /// Not done yet; carries the latest observed status for the progress log.
    Pending(String),
    Failed(FailoverError),
}

impl PollStatus {
    pub fn pending(status: impl ToString) -> Self {
        PollStatus::Pending(status.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    max_attempts: Option<u32>,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(interval: Duration, max_attempts: Option<u32>, cancel: CancellationToken) -> Self {
        Self {
            interval,
            max_attempts,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Invoke `check` every `interval` until it reports `Satisfied`.
    pub async fn wait_until<F, Fut>(&self, description: &str, mut check: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PollStatus>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            sleep(&self.cancel, self.interval, description).await?;
            match check().await {
                PollStatus::Satisfied => {
                    info!(description, attempt, "condition satisfied");
                    return Ok(());
                }
                PollStatus::Failed(err) => return Err(err),
                PollStatus::Pending(status) => {
                    info!(description, attempt, status = %status, "waiting");
                    if self.max_attempts.is_some_and(|max| attempt >= max) {
                        return Err(FailoverError::PollExhausted {
                            description: description.to_string(),
                            attempts: attempt,
                            last_status: status,
                        });
                    }
                }
            }
        }
    }
}

/// Sleep for `duration`, returning `Cancelled` if `cancel` fires first.
pub async fn sleep(cancel: &CancellationToken, duration: Duration, description: &str) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(FailoverError::Cancelled {
            description: description.to_string(),
        });
    }
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(FailoverError::Cancelled {
            description: description.to_string(),
        }),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    fn poller(max: Option<u32>) -> Poller {
        Poller::new(Duration::from_secs(30), max, CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_before_each_check_until_satisfied() {
        let calls = Cell::new(0);
        let start = Instant::now();
        poller(None)
            .wait_until("three checks", || {
                let calls = &calls;
                async move {
                    calls.set(calls.get() + 1);
                    if calls.get() == 3 {
                        PollStatus::Satisfied
                    } else {
                        PollStatus::pending("creating")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(calls.get(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_escalates_without_sleeping_again() {
        let start = Instant::now();
        let err = poller(None)
            .wait_until("failing check", || async {
                PollStatus::Failed(FailoverError::NotFound("db-a".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FailoverError::NotFound(_)));
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_polling_gives_up_with_last_status() {
        let err = poller(Some(4))
            .wait_until("never ready", || async { PollStatus::pending("backing-up") })
            .await
            .unwrap_err();
        match err {
            FailoverError::PollExhausted {
                attempts,
                last_status,
                ..
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(last_status, "backing-up");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_the_wait() {
        let token = CancellationToken::new();
        let p = Poller::new(Duration::from_secs(3600), None, token.clone());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            token.cancel();
        });
        let err = p
            .wait_until("stuck", || async { PollStatus::pending("modifying") })
            .await
            .unwrap_err();
        assert!(matches!(err, FailoverError::Cancelled { .. }));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn zero_interval_does_not_sleep() {
        let p = Poller::new(Duration::ZERO, Some(1), CancellationToken::new());
        p.wait_until("immediate", || async { PollStatus::Satisfied })
            .await
            .unwrap();
    }
}
