//! Accessors translating bucket operations into backend CRUD calls.
//!
//! Two narrow adapters sit between the core and the document store: one
//! for revision records, one for chunk records. Both retry transient
//! backend failures with bounded backoff; only operations that are safe to
//! repeat are retried (reads, deletes, and chunk batches keyed by
//! position, which replace-on-conflict).

pub mod chunks;
pub mod files;

pub use chunks::ChunkStore;
pub use files::FileRevisionStore;

use crate::backend::BackendResult;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Attempts per backend call before an `Unavailable` failure is surfaced.
pub(crate) const MAX_ATTEMPTS: u32 = 3;

const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Run `call` up to [`MAX_ATTEMPTS`] times, sleeping with a doubling
/// backoff between attempts. Only `Unavailable` failures are retried;
/// `NotFound` and `Conflict` surface immediately.
pub(crate) async fn with_retry<T, F, Fut>(op: &'static str, mut call: F) -> BackendResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BackendResult<T>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1u32;
    loop {
        match call().await {
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                warn!(op, attempt, error = %err, "backend unavailable, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Decode failure helper shared by both accessors.
pub(crate) fn decode_error(what: &str, err: serde_json::Error) -> crate::errors::BucketError {
    crate::errors::BucketError::Corrupted(format!("malformed {what} record: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_unavailable_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result: BackendResult<u32> = with_retry("op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(BackendError::Unavailable("flaky".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: BackendResult<u32> = with_retry("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BackendError::Unavailable("down".into())) }
        })
        .await;
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn conflict_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: BackendResult<u32> = with_retry("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BackendError::Conflict("dup".into())) }
        })
        .await;
        assert!(matches!(result, Err(BackendError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
