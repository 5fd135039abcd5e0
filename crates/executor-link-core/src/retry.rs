//! Retry driver for connection lifetimes.
//!
//! The driver invokes a caller-supplied operation that is expected to block
//! for the lifetime of one connection and return an error when it fails.
//! Failures are retried with exponential (or fixed) backoff; a connection
//! that stayed up longer than the configured reset period earns a fresh
//! backoff budget.

use std::future::Future;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RetryConfig;

/// Terminal outcome of a retry loop that never succeeded.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The caller's token fired. Cancellation is never retried.
    #[error("retry cancelled")]
    Cancelled,
    /// Every allowed attempt failed.
    #[error("giving up after {attempts} retries: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
}

/// Invoke `operation` until it succeeds, sleeping between failures.
///
/// With `max_attempts = N` the operation runs up to `N + 1` times with `N`
/// sleeps between runs; `max_attempts = 0` still runs it exactly once. The
/// delay before retry `i` (zero-based) is `initial_delay * 2^i` in
/// exponential mode, or a fixed `initial_delay` otherwise.
///
/// # Errors
/// Returns `RetryError::Exhausted` wrapping the final failure once the
/// attempt budget is spent, or `RetryError::Cancelled` as soon as `cancel`
/// fires.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        let started = Instant::now();
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let uptime = started.elapsed();
        warn!(error = %err, uptime_ms = uptime.as_millis() as u64, "disconnected");

        if let Some(period) = config.reset_period {
            // Sustained uptime forgives earlier instability.
            if uptime > period {
                attempt = 0;
            }
        }

        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        if attempt == config.max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                source: err,
            });
        }

        let delay = if config.use_exponential {
            config
                .initial_delay
                .saturating_mul(2u32.saturating_pow(attempt))
        } else {
            config.initial_delay
        };
        attempt += 1;
        info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting after backoff");

        tokio::select! {
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::time::Duration;

    use super::*;

    fn always_fail() -> std::io::Error {
        std::io::Error::other("connection refused")
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_invocation_count_and_delays() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            reset_period: None,
            use_exponential: true,
        };
        let cancel = CancellationToken::new();
        let starts: RefCell<Vec<Instant>> = RefCell::new(Vec::new());

        let result: Result<(), _> = retry_with_backoff(&config, &cancel, || {
            starts.borrow_mut().push(Instant::now());
            async { Err(always_fail()) }
        })
        .await;

        let starts = starts.into_inner();
        assert_eq!(starts.len(), 4, "max_attempts=3 means 4 invocations");
        assert_eq!(starts[1] - starts[0], Duration::from_secs(1));
        assert_eq!(starts[2] - starts[1], Duration::from_secs(2));
        assert_eq!(starts[3] - starts[2], Duration::from_secs(4));

        match result {
            Err(RetryError::Exhausted { attempts, .. }) => {
                assert_eq!(attempts, 3);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_message_names_attempt_count() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            reset_period: None,
            use_exponential: true,
        };
        let cancel = CancellationToken::new();
        let err = retry_with_backoff::<(), _, _, _>(&config, &cancel, || async {
            Err(always_fail())
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains('3'), "got: {err}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_invokes_once() {
        let config = RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_secs(1),
            reset_period: None,
            use_exponential: true,
        };
        let cancel = CancellationToken::new();
        let calls = RefCell::new(0_u32);
        let before = Instant::now();

        let result: Result<(), _> = retry_with_backoff(&config, &cancel, || {
            *calls.borrow_mut() += 1;
            async { Err(always_fail()) }
        })
        .await;

        assert_eq!(*calls.borrow(), 1);
        assert_eq!(Instant::now(), before, "no sleep before giving up");
        assert!(matches!(
            result,
            Err(RetryError::Exhausted { attempts: 0, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_mode() {
        let config = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_secs(3),
            reset_period: None,
            use_exponential: false,
        };
        let cancel = CancellationToken::new();
        let starts: RefCell<Vec<Instant>> = RefCell::new(Vec::new());

        let _ = retry_with_backoff::<(), _, _, _>(&config, &cancel, || {
            starts.borrow_mut().push(Instant::now());
            async { Err(always_fail()) }
        })
        .await;

        let starts = starts.into_inner();
        assert_eq!(starts.len(), 3);
        assert_eq!(starts[1] - starts[0], Duration::from_secs(3));
        assert_eq!(starts[2] - starts[1], Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_uptime_resets_attempt_counter() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            reset_period: Some(Duration::from_secs(5)),
            use_exponential: true,
        };
        let cancel = CancellationToken::new();
        let starts: RefCell<Vec<Instant>> = RefCell::new(Vec::new());

        let result = retry_with_backoff(&config, &cancel, || {
            let call = {
                let mut starts = starts.borrow_mut();
                starts.push(Instant::now());
                starts.len()
            };
            async move {
                match call {
                    // Two quick failures drive the exponent up.
                    1 | 2 => Err(always_fail()),
                    // A long-lived connection: up for 6s, past the 5s
                    // reset period, then drops.
                    3 => {
                        tokio::time::sleep(Duration::from_secs(6)).await;
                        Err(always_fail())
                    }
                    _ => Ok(()),
                }
            }
        })
        .await;

        assert!(result.is_ok());
        let starts = starts.into_inner();
        assert_eq!(starts.len(), 4);
        assert_eq!(starts[1] - starts[0], Duration::from_secs(1));
        assert_eq!(starts[2] - starts[1], Duration::from_secs(2));
        // Counter was reset, so the delay after the long-lived connection is
        // back to 2^0 * initial, not 2^2.
        assert_eq!(starts[3] - (starts[2] + Duration::from_secs(6)), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_not_retried() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            reset_period: None,
            use_exponential: true,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = RefCell::new(0_u32);

        let result: Result<(), _> = retry_with_backoff(&config, &cancel, || {
            *calls.borrow_mut() += 1;
            async { Err(always_fail()) }
        })
        .await;

        assert_eq!(*calls.borrow(), 1);
        assert!(matches!(result, Err(RetryError::Cancelled)));
    }
}
