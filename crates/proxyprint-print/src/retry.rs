// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry policy for persisted-store lookups.
//
// The persisted path usually commits a job a moment after the printer has
// reported it, so an active-job lookup that misses is retried a bounded
// number of times before the miss is treated as an integrity problem.
// Transient store errors are retried the same way; anything else gives up.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use proxyprint_core::error::{ProxyPrintError, Result};

/// Fixed-delay retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first.  At least one.
    attempts: u32,
    /// Delay between attempts.
    delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::fixed(3, Duration::from_millis(500))
    }
}

impl RetryConfig {
    /// `attempts` tries in total with a constant `delay` between them.
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Whether an error may clear up on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

/// Classify a `ProxyPrintError` for retry decisions.
pub fn classify_error(err: &ProxyPrintError) -> ErrorClass {
    match err {
        ProxyPrintError::Database(_)
        | ProxyPrintError::Gateway(_)
        | ProxyPrintError::GatewayTimeout => ErrorClass::Transient,
        ProxyPrintError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ErrorClass::Permanent
            }
            _ => ErrorClass::Transient,
        },
        _ => ErrorClass::Permanent,
    }
}

/// Run `lookup` until it finds something, a permanent error occurs, or the
/// attempts are used up.
///
/// `Ok(None)` means the last attempt missed.  When the last attempt failed
/// with a transient error, that error is returned: an unreachable store is
/// not a miss.
pub async fn retry_lookup<T, F, Fut>(config: &RetryConfig, mut lookup: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut attempt = 1;
    loop {
        let failure = match lookup().await {
            Ok(Some(found)) => return Ok(Some(found)),
            Ok(None) => None,
            Err(e) if classify_error(&e) == ErrorClass::Transient => {
                warn!(attempt, "lookup failed: {e}");
                Some(e)
            }
            Err(e) => return Err(e),
        };
        if attempt >= config.attempts {
            return match failure {
                Some(e) => Err(e),
                None => Ok(None),
            };
        }
        debug!(attempt, delay_ms = config.delay.as_millis() as u64, "scheduling retry");
        tokio::time::sleep(config.delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn database_errors_are_transient() {
        let err = ProxyPrintError::Database("database is locked".into());
        assert_eq!(classify_error(&err), ErrorClass::Transient);
    }

    #[test]
    fn planning_errors_are_permanent() {
        assert_eq!(classify_error(&ProxyPrintError::NotVanilla), ErrorClass::Permanent);
    }

    #[test]
    fn at_least_one_attempt() {
        let config = RetryConfig::fixed(0, Duration::from_millis(250));
        assert_eq!(config.attempts(), 1);
        assert_eq!(config.delay(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_stops_at_first_hit() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::fixed(5, Duration::from_millis(10));
        let counter = &calls;
        let found = retry_lookup(&config, move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(if n == 2 { Some(n) } else { None })
        })
        .await
        .unwrap();
        assert_eq!(found, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_gives_up_after_all_attempts() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::fixed(3, Duration::from_millis(10));
        let counter = &calls;
        let found: Option<u32> = retry_lookup(&config, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        })
        .await
        .unwrap();
        assert!(found.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_is_returned() {
        let config = RetryConfig::fixed(3, Duration::from_millis(10));
        let result: Result<Option<u32>> =
            retry_lookup(&config, || async { Err(ProxyPrintError::NotVanilla) }).await;
        assert!(matches!(result, Err(ProxyPrintError::NotVanilla)));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_transient_error_is_returned() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::fixed(3, Duration::from_millis(10));
        let counter = &calls;
        let result: Result<Option<u32>> = retry_lookup(&config, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ProxyPrintError::Database("database is locked".into()))
        })
        .await;
        assert!(matches!(result, Err(ProxyPrintError::Database(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn miss_after_recovered_error_is_a_miss() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::fixed(2, Duration::from_millis(10));
        let counter = &calls;
        let result: Result<Option<u32>> = retry_lookup(&config, move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProxyPrintError::Database("database is locked".into()))
            } else {
                Ok(None)
            }
        })
        .await;
        assert!(matches!(result, Ok(None)));
    }
}
