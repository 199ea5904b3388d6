//! Execution deadlines.
//!
//! Each execution owns one [`ExecutionDeadline`]. Its cancellation token is
//! cancelled by a timer when the deadline passes and when the deadline is
//! dropped, so every task tied to the token stops with the execution.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct ExecutionDeadline {
    timeout: Duration,
    expires_at: Instant,
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl ExecutionDeadline {
    /// Start the clock. Must be called within a tokio runtime.
    pub fn start(timeout: Duration) -> Self {
        let expires_at = Instant::now() + timeout;
        let token = CancellationToken::new();
        let timer = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::time::sleep_until(expires_at).await;
                token.cancel();
            }
        });

        Self {
            timeout,
            expires_at,
            token,
            timer,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token cancelled at expiry.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Run `future` until it completes or the deadline passes.
    ///
    /// Returns `None` on expiry; an already expired deadline never polls
    /// `future`.
    pub async fn run<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            output = future => Some(output),
        }
    }
}

impl Drop for ExecutionDeadline {
    fn drop(&mut self) {
        self.timer.abort();
        self.token.cancel();
    }
}
