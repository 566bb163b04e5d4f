use crate::config::RetrySettings;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Calculate the delay for the next retry attempt with exponential backoff.
pub fn next_retry_delay(attempt: usize, base_ms: u64, max_ms: u64) -> Duration {
    let multiplier = 2_u64.saturating_pow(attempt as u32);
    let delay = base_ms.saturating_mul(multiplier);
    // Add jitter up to 100ms
    let jitter = rand::random::<u64>() % 100;
    let total = delay.saturating_add(jitter);
    Duration::from_millis(total.min(max_ms))
}

/// Execute an async operation with retries.
///
/// The caller decides which errors are retryable via `should_retry`;
/// terminal errors surface on the first attempt.
pub async fn retry_async<T, E, F, Fut, P>(
    operation_name: &str,
    settings: RetrySettings,
    should_retry: P,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if !should_retry(&e) || attempt >= settings.max_attempts as usize {
                    if attempt >= settings.max_attempts as usize {
                        error!(
                            "Failed to execute '{}' after {} attempts: {}",
                            operation_name, settings.max_attempts, e
                        );
                    }
                    return Err(e);
                }
                let delay =
                    next_retry_delay(attempt, settings.base_delay_ms, settings.max_delay_ms);
                warn!(
                    "Operation '{}' failed. Retrying in {:?} (Attempt {}/{}): {}",
                    operation_name, delay, attempt, settings.max_attempts, e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_settings() -> RetrySettings {
        RetrySettings {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[test]
    fn test_next_retry_delay_is_bounded() {
        for attempt in 0..10 {
            let delay = next_retry_delay(attempt, 250, 2000);
            assert!(delay <= Duration::from_millis(2000));
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failure() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, String> =
            retry_async("test_op", fast_settings(), |_| true, || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("transient".to_string())
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, String> =
            retry_async("test_op", fast_settings(), |_| true, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("still broken".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_terminal_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, String> =
            retry_async("test_op", fast_settings(), |_| false, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("terminal".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
