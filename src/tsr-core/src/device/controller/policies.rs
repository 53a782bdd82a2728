// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Retry policies for remote calls.
//!
//! Only errors classified as transient are ever retried; everything else is
//! surfaced to the caller on the first failure.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::device::error::{DeviceError, DeviceResult};

/// When and how long to wait before calling a remote peer again.
///
/// `attempt` counts the tries made so far, so it is 1 after the first
/// failure.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, attempt: u32, error: &DeviceError) -> bool;

    fn delay(&self, attempt: u32) -> Duration;

    /// Upper bound on tries, the first one included.
    fn max_attempts(&self) -> u32;
}

/// Bounded number of tries with the same pause between each.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    max_attempts: u32,
    delay: Duration,
}

impl FixedDelay {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl RetryPolicy for FixedDelay {
    fn should_retry(&self, attempt: u32, error: &DeviceError) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }

    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Run `op` until it succeeds or `policy` gives up, sleeping between tries.
pub async fn retry_with<T, F, Fut>(policy: &dyn RetryPolicy, what: &str, mut op: F) -> DeviceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DeviceResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if policy.should_retry(attempt, &err) => {
                let delay = policy.delay(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt,
                    policy.max_attempts(),
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_fixed_delay_only_retries_transient() {
        let policy = FixedDelay::new(3, Duration::from_millis(300));
        let inexistent = DeviceError::transient("inexistent");

        assert_eq!(policy.delay(4), Duration::from_millis(300));
        assert!(policy.should_retry(2, &inexistent));
        assert!(!policy.should_retry(3, &inexistent));
        assert!(!policy.should_retry(1, &DeviceError::conflict("already exists")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_with_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = FixedDelay::new(5, Duration::from_millis(300));
        let started = tokio::time::Instant::now();

        let result: DeviceResult<()> = retry_with(&policy, "get element", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DeviceError::transient("element inexistent")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(started.elapsed(), Duration::from_millis(4 * 300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_with_stops_on_non_transient() {
        let calls = AtomicU32::new(0);
        let policy = FixedDelay::new(5, Duration::from_millis(300));

        let result: DeviceResult<()> = retry_with(&policy, "take", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DeviceError::remote("template missing")) }
        })
        .await;

        assert_eq!(result, Err(DeviceError::remote("template missing")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_with_recovers() {
        let calls = AtomicU32::new(0);
        let policy = FixedDelay::new(5, Duration::from_millis(300));

        let result = retry_with(&policy, "cue", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DeviceError::transient("inexistent"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
    }
}
