use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{error, warn};

/// Why a single attempt failed.
#[derive(Debug, Error)]
pub enum AttemptError<E> {
    #[error("attempt timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("{0}")]
    Failed(E),
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("all {attempts} attempts failed; last error: {last}")]
    Exhausted { attempts: u32, last: AttemptError<E> },
}

impl<E> RetryError<E> {
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Bounded retry with a per-attempt deadline and a fixed backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of invocations. Zero is treated as one.
    pub attempts: u32,
    pub per_attempt_timeout: Duration,
    /// Fixed delay between a failed attempt and the next one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            per_attempt_timeout: Duration::from_secs(5),
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(attempts: u32, per_attempt_timeout: Duration, backoff: Duration) -> Self {
        Self {
            attempts,
            per_attempt_timeout,
            backoff,
        }
    }

    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        retry_with_timeout(operation, self.attempts, self.per_attempt_timeout, self.backoff).await
    }

    /// Upper bound on how long `execute` can take.
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        let attempts = self.attempts.max(1);
        self.per_attempt_timeout * attempts + self.backoff * (attempts - 1)
    }
}

/// Retry an async operation, giving each attempt at most `per_attempt_timeout`.
///
/// The first successful attempt is returned immediately. A timed-out attempt
/// counts as a failure; its future is dropped, which stops the wait but does
/// not guarantee the remote side abandons the request.
///
/// # Arguments
/// * `operation` - Builds a fresh attempt on every call
/// * `attempts` - Maximum number of invocations of `operation`
/// * `per_attempt_timeout` - Deadline for a single attempt
/// * `backoff` - Fixed delay before the next attempt
pub async fn retry_with_timeout<F, Fut, T, E>(
    mut operation: F,
    attempts: u32,
    per_attempt_timeout: Duration,
    backoff: Duration,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        let failure = match timeout(per_attempt_timeout, operation()).await {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(e)) => AttemptError::Failed(e),
            Err(_) => AttemptError::TimedOut(per_attempt_timeout),
        };

        if attempt >= attempts {
            error!("Request failed (attempt {attempt}/{attempts}): {failure}. Giving up");
            return Err(RetryError::Exhausted {
                attempts,
                last: failure,
            });
        }

        warn!(
            "Request failed (attempt {attempt}/{attempts}): {failure}. Retrying after {}ms...",
            backoff.as_millis()
        );
        sleep(backoff).await;
        attempt += 1;
    }
}
