use std::{future::Future, time::Duration};

use log::{error, warn};
use rand::Rng;

use crate::kubernetes::ClusterError;

/// Bounded exponential backoff for transient cluster errors.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// total number of attempts, the first one included
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Delay before the given retry (1-based), before jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(retry.saturating_sub(1) as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;

        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Runs `operation` until it succeeds, fails permanently or runs out of attempts.
    /// Only transient errors are retried.
    pub async fn run<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T, ClusterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClusterError>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let err = match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }

            if attempt >= self.max_attempts.max(1) {
                error!("{operation_name} failed after {attempt} attempts! Reason: {err}");
                return Err(err);
            }

            // 0.5x to 1.5x of the nominal delay
            let jitter = rand::thread_rng().gen_range(0.5..1.5);
            let delay = Duration::from_secs_f64(self.delay_for(attempt).as_secs_f64() * jitter);

            warn!(
                "{operation_name} failed (attempt {attempt}/{}), retrying in {}ms... Reason: {err}",
                self.max_attempts,
                delay.as_millis()
            );

            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use super::*;

    fn unavailable() -> ClusterError {
        ClusterError::Unavailable("connection reset".to_owned())
    }

    #[test]
    fn delays_grow_and_are_capped() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result = RetryPolicy::default()
            .run("update", || {
                let c = c.clone();
                async move {
                    match c.fetch_add(1, Ordering::SeqCst) < 2 {
                        true => Err(unavailable()),
                        false => Ok(42),
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<(), _> = RetryPolicy::with_max_attempts(3)
            .run("create", || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(unavailable())
                }
            })
            .await;

        assert_eq!(result, Err(unavailable()));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rejections_are_not_retried() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let rejected = ClusterError::Rejected {
            code: 422,
            message: "spec.selector: field is immutable".to_owned(),
        };
        let expected = rejected.clone();

        let result: Result<(), _> = RetryPolicy::default()
            .run("update", || {
                let c = c.clone();
                let rejected = rejected.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(rejected)
                }
            })
            .await;

        assert_eq!(result, Err(expected));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
