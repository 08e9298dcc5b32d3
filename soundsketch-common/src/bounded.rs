//! Bounded async calls
//!
//! Every outbound collaborator request (search, single-recording lookup,
//! LLM analysis) runs under an explicit deadline. The caller must be able
//! to tell a deadline expiry apart from an error the collaborator itself
//! reported, because the two trigger different fallback behavior.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Failure of a bounded call: either the deadline fired, or the underlying
/// operation failed on its own.
#[derive(Debug, Error)]
pub enum BoundedError<E>
where
    E: std::error::Error,
{
    /// The deadline elapsed before the operation completed
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The operation itself failed within the deadline
    #[error(transparent)]
    Inner(E),
}

impl<E: std::error::Error> BoundedError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BoundedError::Timeout(_))
    }
}

/// Run a fallible future under a deadline.
///
/// Returns `BoundedError::Timeout` if the deadline elapses first, and
/// `BoundedError::Inner` if the future completes with an error.
pub async fn bounded<T, E, F>(limit: Duration, fut: F) -> Result<T, BoundedError<E>>
where
    E: std::error::Error,
    F: Future<Output = std::result::Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(BoundedError::Inner(e)),
        Err(_) => Err(BoundedError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[tokio::test]
    async fn completes_within_deadline() {
        let result: Result<u32, BoundedError<Boom>> =
            bounded(Duration::from_secs(1), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn inner_error_is_not_a_timeout() {
        let result: Result<u32, BoundedError<Boom>> =
            bounded(Duration::from_secs(1), async { Err(Boom) }).await;
        let err = result.unwrap_err();
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn deadline_expiry_is_a_timeout() {
        let result: Result<u32, BoundedError<Boom>> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        })
        .await;
        let err = result.unwrap_err();
        assert!(err.is_timeout());
    }
}
