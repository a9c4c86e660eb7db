//! Bounded retry for transient gateway errors.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::port::Clock;

/// Fixed-attempt, fixed-delay retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `transient` classifies errors; a permanent error aborts immediately.
    pub async fn run<T, E, F, Fut, C>(
        &self,
        clock: &Arc<dyn Clock>,
        what: &str,
        transient: C,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        C: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if transient(&err) && attempt < self.attempts => {
                    warn!(
                        error = %err,
                        attempt,
                        "{what} failed, retrying in {:?}",
                        self.delay
                    );
                    clock.sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
