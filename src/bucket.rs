//! Bucket façade: the public surface of the chunked object store.

use crate::backend::DocumentStore;
use crate::config::BucketConfig;
use crate::download::DownloadStream;
use crate::errors::{BucketError, BucketResult};
use crate::models::FileRevision;
use crate::store::{ChunkStore, FileRevisionStore};
use crate::upload::UploadSession;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// One logical chunked-object namespace over a document-store backend.
///
/// A bucket owns no mutable state beyond its immutable [`BucketConfig`],
/// so a single instance (or any number of instances over the same backend)
/// can serve concurrent uploads, downloads, and maintenance operations
/// without locks. "Latest revision" is computed at read time from commit
/// timestamps, never enforced by serializing writers.
#[derive(Clone)]
pub struct Bucket {
    backend: Arc<dyn DocumentStore>,
    config: BucketConfig,
    files: FileRevisionStore,
    chunks: ChunkStore,
}

impl Bucket {
    /// Build a bucket over `backend`. Validates the configuration; does
    /// not touch the backend — call [`mount`](Self::mount) before first
    /// use.
    pub fn new(backend: Arc<dyn DocumentStore>, config: BucketConfig) -> BucketResult<Self> {
        config.validate()?;
        let files = FileRevisionStore::new(
            Arc::clone(&backend),
            config.files_collection.clone(),
            config.filename_field.clone(),
        );
        let chunks = ChunkStore::new(
            Arc::clone(&backend),
            config.chunks_collection.clone(),
            config.files_id_field.clone(),
        );
        Ok(Self {
            backend,
            config,
            files,
            chunks,
        })
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    /// Idempotent initialization: ensure both collections and both
    /// required indexes exist, and wait for each index to be servable.
    /// Safe to call repeatedly and from multiple bucket instances
    /// concurrently.
    pub async fn mount(&self) -> BucketResult<()> {
        for (collection, field) in [
            (
                self.config.files_collection.as_str(),
                self.config.filename_field.as_str(),
            ),
            (
                self.config.chunks_collection.as_str(),
                self.config.files_id_field.as_str(),
            ),
        ] {
            self.backend.ensure_collection(collection).await?;
            self.backend.ensure_index(collection, field).await?;
            self.backend.wait_for_index(collection, field).await?;
        }
        info!(
            files = %self.config.files_collection,
            chunks = %self.config.chunks_collection,
            "bucket mounted"
        );
        Ok(())
    }

    /// Upload `payload` as a new revision of `filename`.
    ///
    /// Returns the committed revision (id and digest included). The upload
    /// is invisible to every reader until the commit succeeds; a failed
    /// upload leaves the bucket observably unchanged.
    pub async fn upload(&self, filename: &str, payload: Bytes) -> BucketResult<FileRevision> {
        if filename.is_empty() {
            return Err(BucketError::InvalidFilename);
        }
        let session = UploadSession::new(
            self.files.clone(),
            self.chunks.clone(),
            filename.to_string(),
            self.config.chunk_size_bytes,
            self.config.chunk_batch_size,
        );
        session.run(payload).await
    }

    /// Fully materialize the latest revision of `filename`.
    pub async fn download(&self, filename: &str) -> BucketResult<Bytes> {
        self.open_download_stream(filename).await?.read_all().await
    }

    /// Fully materialize the revision with this id.
    pub async fn download_revision(&self, id: Uuid) -> BucketResult<Bytes> {
        self.open_revision_stream(id).await?.read_all().await
    }

    /// Fully materialize the revision of `filename` selected by
    /// `selector` (see [`find_revision`](Self::find_revision)).
    pub async fn download_at(&self, filename: &str, selector: i64) -> BucketResult<Bytes> {
        self.open_download_stream_at(filename, selector)
            .await?
            .read_all()
            .await
    }

    /// Open a lazy stream over the latest revision of `filename`, for
    /// consumers that do not want the whole file buffered.
    pub async fn open_download_stream(&self, filename: &str) -> BucketResult<DownloadStream> {
        let revision = self.resolve_latest(filename).await?;
        Ok(DownloadStream::open(&self.chunks, revision))
    }

    /// Open a lazy stream over the revision with this id.
    pub async fn open_revision_stream(&self, id: Uuid) -> BucketResult<DownloadStream> {
        let revision = self.resolve_id(id).await?;
        Ok(DownloadStream::open(&self.chunks, revision))
    }

    /// Open a lazy stream over a selected revision of `filename`.
    pub async fn open_download_stream_at(
        &self,
        filename: &str,
        selector: i64,
    ) -> BucketResult<DownloadStream> {
        let revision = self.find_revision(filename, selector).await?;
        Ok(DownloadStream::open(&self.chunks, revision))
    }

    /// Resolve one revision of `filename` by position: `0` is the oldest
    /// revision, `1` the next, and so on; negative selectors count from
    /// the newest, so `-1` is the latest. Fails with `FileNotFound` when
    /// the selector is out of range or no revision exists.
    pub async fn find_revision(
        &self,
        filename: &str,
        selector: i64,
    ) -> BucketResult<FileRevision> {
        let revisions = self.files.list(filename).await?;
        // `revisions` is newest-first.
        let index = if selector < 0 {
            selector
                .checked_neg()
                .and_then(|n| usize::try_from(n - 1).ok())
        } else {
            revisions
                .len()
                .checked_sub(1)
                .and_then(|last| last.checked_sub(selector as usize))
        };
        index
            .and_then(|i| revisions.into_iter().nth(i))
            .ok_or_else(|| BucketError::FileNotFound {
                filename: filename.to_string(),
            })
    }

    /// All committed revisions of `filename`, most recent first. Empty if
    /// none exist.
    pub async fn list_revisions(&self, filename: &str) -> BucketResult<Vec<FileRevision>> {
        self.files.list(filename).await
    }

    /// Delete one revision and its chunks.
    ///
    /// The revision record goes first: once it is gone no reader can
    /// discover the chunks, so the two deletes need no transaction.
    pub async fn delete_revision(&self, id: Uuid) -> BucketResult<()> {
        if !self.files.delete_by_id(id).await? {
            return Err(BucketError::RevisionNotFound { id });
        }
        let removed = self.chunks.delete_for(id).await?;
        debug!(%id, chunks_removed = removed, "revision deleted");
        Ok(())
    }

    /// Delete every revision of `filename` and their chunks. Returns the
    /// number of revisions removed; fails with `FileNotFound` when none
    /// exist.
    pub async fn delete_all_revisions(&self, filename: &str) -> BucketResult<u64> {
        let revisions = self.files.list(filename).await?;
        if revisions.is_empty() {
            return Err(BucketError::FileNotFound {
                filename: filename.to_string(),
            });
        }
        let mut deleted = 0u64;
        for revision in revisions {
            if self.files.delete_by_id(revision.id).await? {
                self.chunks.delete_for(revision.id).await?;
                deleted += 1;
            }
        }
        debug!(filename, deleted, "deleted all revisions");
        Ok(deleted)
    }

    /// Delete every revision and chunk record in the bucket. Not
    /// reversible; leaves the collections and indexes in place.
    ///
    /// Racing an in-flight upload is not atomic: that upload either fully
    /// survives or fully disappears, except for the documented window
    /// where a commit lands between the two collection clears.
    pub async fn purge(&self) -> BucketResult<()> {
        let files_removed = self.files.delete_all().await?;
        let chunks_removed = self.chunks.delete_all().await?;
        info!(files_removed, chunks_removed, "bucket purged");
        Ok(())
    }

    async fn resolve_latest(&self, filename: &str) -> BucketResult<FileRevision> {
        self.files
            .find_latest(filename)
            .await?
            .ok_or_else(|| BucketError::FileNotFound {
                filename: filename.to_string(),
            })
    }

    async fn resolve_id(&self, id: Uuid) -> BucketResult<FileRevision> {
        self.files
            .find_by_id(id)
            .await?
            .ok_or(BucketError::RevisionNotFound { id })
    }
}
