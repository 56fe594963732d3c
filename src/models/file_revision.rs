//! Represents one committed upload of a filename.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a revision record.
///
/// Only `Committed` is ever persisted: a revision record is written once,
/// after every chunk it references has been acknowledged, and is never
/// updated afterwards. There is no persisted "pending" state — visibility
/// of an upload is gated entirely by the existence of this record.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum RevisionStatus {
    Committed,
}

/// One immutable, committed revision of a named file.
///
/// Many revisions may share the same `filename`; "latest" is computed at
/// read time from `uploaded_at` (ties broken by `id`, descending), never
/// by updating records in place.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct FileRevision {
    /// Unique identifier for this revision. Also the value every owned
    /// chunk record carries in its `files_id` field.
    pub id: Uuid,

    /// Name the file was uploaded under. Not unique across revisions.
    pub filename: String,

    /// Total payload length in bytes.
    pub length: i64,

    /// Chunk size this revision was split with. The revision owns exactly
    /// `ceil(length / chunk_size)` chunks.
    pub chunk_size: i64,

    /// Commit timestamp. Stored as epoch microseconds so revision ordering
    /// is a plain numeric comparison in the backing store.
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub uploaded_at: DateTime<Utc>,

    /// Hex digest of the complete payload, computed before splitting and
    /// re-checked on download.
    pub digest: String,

    /// Always `Committed` once persisted.
    pub status: RevisionStatus,
}

impl FileRevision {
    /// Number of chunk records this revision references.
    pub fn chunk_count(&self) -> i64 {
        if self.length == 0 {
            0
        } else {
            (self.length + self.chunk_size - 1) / self.chunk_size
        }
    }
}
