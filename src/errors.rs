//! Bucket error taxonomy.
//!
//! Four failure families cross the public API, each with distinct retry
//! semantics:
//!
//! - validation errors (bad input) — surfaced immediately, never retried
//! - not-found errors — surfaced to the caller, never retried
//! - `UploadFailed` / `DownloadFailed` — a transient backend outage that
//!   survived the accessor layer's bounded retries
//! - `Corrupted` — integrity violation observed while reading; fatal to
//!   that download, never retried automatically (a retry would re-read the
//!   same corrupted records)

use crate::backend::BackendError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BucketError {
    /// Upload was given an empty filename.
    #[error("filename must not be empty")]
    InvalidFilename,

    /// Configured chunk size is not a positive number of bytes.
    #[error("chunk size must be positive, got {0}")]
    InvalidChunkSize(i64),

    /// Bucket configuration is unusable (bad collection or index name).
    #[error("invalid bucket config: {0}")]
    InvalidConfig(String),

    /// No committed revision exists for this filename (or selector).
    #[error("file `{filename}` not found")]
    FileNotFound { filename: String },

    /// No committed revision exists with this id.
    #[error("revision `{id}` not found")]
    RevisionNotFound { id: Uuid },

    /// Upload gave up after exhausting retries against an unavailable
    /// backend; the session was aborted and its chunks cleaned up
    /// best-effort.
    #[error("upload failed: {source}")]
    UploadFailed {
        #[source]
        source: BackendError,
    },

    /// Download gave up after exhausting retries against an unavailable
    /// backend.
    #[error("download failed: {source}")]
    DownloadFailed {
        #[source]
        source: BackendError,
    },

    /// The chunk sequence read back for a revision violated an integrity
    /// invariant: an index gap or duplicate, a chunk of the wrong size, a
    /// total length mismatch, or a digest mismatch.
    #[error("corrupted stream: {0}")]
    Corrupted(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type BucketResult<T> = Result<T, BucketError>;

impl BucketError {
    /// Map a backend failure that terminated an upload into the
    /// caller-facing `UploadFailed` kind.
    pub(crate) fn upload_failed(source: BackendError) -> Self {
        BucketError::UploadFailed { source }
    }

    /// Map a backend failure that terminated a download into the
    /// caller-facing `DownloadFailed` kind.
    pub(crate) fn download_failed(source: BackendError) -> Self {
        BucketError::DownloadFailed { source }
    }
}
