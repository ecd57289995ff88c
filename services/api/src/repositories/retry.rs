//! Bounded replay of transactions that lost a race

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::StoreError;

/// Base pause between attempts, multiplied by the attempt number
const RETRY_BACKOFF_MS: u64 = 10;

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is used up. Each call must open its own transaction.
pub async fn retry_on_conflict<T, F, Fut>(max_attempts: u32, mut operation: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                warn!(attempt, max_attempts, error = %err, "Transaction conflict, retrying");
                tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt))).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::test_support::db_error;
    use common::error::sqlstate;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_serialization_failures() {
        let calls = AtomicU32::new(0);

        let result = retry_on_conflict(3, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StoreError::from(db_error(sqlstate::SERIALIZATION_FAILURE, None)))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_on_conflict(3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::from(db_error(sqlstate::DEADLOCK_DETECTED, None)))
        })
        .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_business_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_on_conflict(3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::EmptyCart)
        })
        .await;

        assert!(matches!(result, Err(StoreError::EmptyCart)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
