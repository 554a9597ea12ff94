use std::future::Future;
use std::time::{Duration, Instant};

use tempest_core::RetryConfig;

/// Execute `func` with the retry contract in spec §4.4: retry while the
/// attempt count allows it and either the error is retryable or the
/// result itself asks to be retried; sleep between attempts per the
/// policy's configured backoff; `on_attempt` observes every attempt
/// regardless of outcome.
///
/// Mirrors the predecessor's `with_retry` in
/// `turbulence/utils/retry_policy.py`, adapted to `Result<T, E>` in place
/// of exception/return: the "exception path" is `Err`, the "result that
/// may still want a retry" path is `Ok` plus `should_retry_result`.
pub async fn with_retry<T, E, Fut>(
    config: &RetryConfig,
    mut func: impl FnMut(u32) -> Fut,
    mut is_retryable: impl FnMut(&E) -> bool,
    mut should_retry_result: impl FnMut(&T) -> bool,
    mut on_attempt: impl FnMut(u32, Option<&T>, Option<&E>, f64),
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    for attempt in 1..=config.max_attempts {
        let start = Instant::now();
        let result = func(attempt).await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(value) => {
                on_attempt(attempt, Some(&value), None, duration_ms);
                if attempt < config.max_attempts && should_retry_result(&value) {
                    tokio::time::sleep(Duration::from_millis(config.delay_for_attempt(attempt))).await;
                    continue;
                }
                return Ok(value);
            }
            Err(error) => {
                on_attempt(attempt, None, Some(&error), duration_ms);
                if attempt == config.max_attempts || !is_retryable(&error) {
                    return Err(error);
                }
                tokio::time::sleep(Duration::from_millis(config.delay_for_attempt(attempt))).await;
            }
        }
    }
    unreachable!("the final attempt always returns from within the loop")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempest_core::Backoff;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            on_status: Default::default(),
            on_timeout: false,
            on_connection_error: false,
            backoff: Backoff::Fixed,
            delay_ms: 1,
            base_delay_ms: 1,
            max_delay_ms: 10,
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(
            &config(3),
            |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            },
            |_: &&str| true,
            |_: &u32| false,
            |_, _, _, _| {},
        )
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_retryable_error_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(
            &config(3),
            |_attempt| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err("flaky") } else { Ok(9) } }
            },
            |_: &&str| true,
            |_: &u32| false,
            |_, _, _, _| {},
        )
        .await;
        assert_eq!(result, Ok(9));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(
            &config(5),
            |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            },
            |_: &&str| false,
            |_: &u32| false,
            |_, _, _, _| {},
        )
        .await;
        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(
            &config(3),
            |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("still broken") }
            },
            |_: &&str| true,
            |_: &u32| false,
            |_, _, _, _| {},
        )
        .await;
        assert_eq!(result, Err("still broken"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_on_retryable_result_then_returns_final() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(
            &config(3),
            |_attempt| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(n) }
            },
            |_: &&str| true,
            |v: &u32| *v < 2,
            |_, _, _, _| {},
        )
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn on_attempt_observes_every_attempt() {
        let mut observed = Vec::new();
        let result: Result<u32, &str> = with_retry(
            &config(2),
            |attempt| async move { if attempt == 1 { Err("first fails") } else { Ok(1) } },
            |_: &&str| true,
            |_: &u32| false,
            |attempt, ok, err, _duration| {
                observed.push((attempt, ok.copied(), err.copied()));
            },
        )
        .await;
        assert_eq!(result, Ok(1));
        assert_eq!(observed, vec![(1, None, Some("first fails")), (2, Some(1), None)]);
    }
}
