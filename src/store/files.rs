//! Revision record accessor.

use crate::backend::{BackendError, DocumentStore, SortOrder};
use crate::errors::{BucketError, BucketResult};
use crate::models::FileRevision;
use crate::store::{decode_error, with_retry};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Accessor for the files collection.
///
/// Reads are retried on transient failure. The single-record `insert` is
/// deliberately not retried: it is the commit marker of an upload, and its
/// caller decides what a failed commit means.
#[derive(Clone)]
pub struct FileRevisionStore {
    backend: Arc<dyn DocumentStore>,
    collection: String,
    filename_field: String,
}

impl FileRevisionStore {
    pub fn new(
        backend: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        filename_field: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            collection: collection.into(),
            filename_field: filename_field.into(),
        }
    }

    /// Write one committed revision record. This is the commit point of an
    /// upload: the revision (and its chunks) become visible exactly when
    /// this insert succeeds.
    pub async fn insert(&self, revision: &FileRevision) -> BucketResult<()> {
        let doc = serde_json::to_value(revision)
            .map_err(|err| BucketError::Corrupted(format!("encoding revision: {err}")))?;
        self.backend
            .insert(&self.collection, &revision.id.to_string(), doc)
            .await?;
        debug!(id = %revision.id, filename = %revision.filename, "revision committed");
        Ok(())
    }

    /// Most recent committed revision for `filename`, if any.
    ///
    /// "Most recent" is `uploaded_at` descending; two revisions with an
    /// identical timestamp (low-resolution clock collision) are ordered by
    /// `id` descending, which is deterministic for a given pair of
    /// records.
    pub async fn find_latest(&self, filename: &str) -> BucketResult<Option<FileRevision>> {
        Ok(self.list(filename).await?.into_iter().next())
    }

    /// Committed revision with this id, if any.
    pub async fn find_by_id(&self, id: Uuid) -> BucketResult<Option<FileRevision>> {
        let id = id.to_string();
        let doc = with_retry("files.get", || self.backend.get(&self.collection, &id)).await?;
        doc.map(|doc| {
            serde_json::from_value::<FileRevision>(doc)
                .map_err(|err| decode_error("revision", err))
        })
        .transpose()
    }

    /// All committed revisions for `filename`, most recent first (same
    /// ordering as [`find_latest`](Self::find_latest)). Empty if none.
    pub async fn list(&self, filename: &str) -> BucketResult<Vec<FileRevision>> {
        let value = Value::String(filename.to_string());
        let order = [("uploaded_at", SortOrder::Desc), ("id", SortOrder::Desc)];
        let docs = with_retry("files.list", || {
            self.backend
                .find_by_index(&self.collection, &self.filename_field, &value, &order)
        })
        .await?;
        docs.into_iter()
            .map(|doc| {
                serde_json::from_value::<FileRevision>(doc)
                    .map_err(|err| decode_error("revision", err))
            })
            .collect()
    }

    /// Delete one revision record. Returns whether a record existed.
    pub async fn delete_by_id(&self, id: Uuid) -> BucketResult<bool> {
        let id = id.to_string();
        let removed =
            with_retry("files.delete", || self.backend.delete(&self.collection, &id)).await?;
        Ok(removed > 0)
    }

    /// Delete every revision record in the bucket.
    pub async fn delete_all(&self) -> Result<u64, BackendError> {
        with_retry("files.delete_all", || self.backend.delete_all(&self.collection)).await
    }
}
