//! Chunk record accessor.

use crate::backend::{BackendError, DocumentStore};
use crate::errors::BucketResult;
use crate::models::Chunk;
use crate::store::{decode_error, with_retry};
use futures::Stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Accessor for the chunks collection.
///
/// Chunk batches are retried on transient failure: records are keyed by
/// `(files_id, num)` and batch inserts replace on conflict, so a repeated
/// batch is an overwrite of identical data, never a duplicate.
#[derive(Clone)]
pub struct ChunkStore {
    backend: Arc<dyn DocumentStore>,
    collection: String,
    files_id_field: String,
}

impl ChunkStore {
    pub fn new(
        backend: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        files_id_field: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            collection: collection.into(),
            files_id_field: files_id_field.into(),
        }
    }

    /// Write one batch of chunks, retrying transient failures.
    pub async fn insert_batch(&self, chunks: &[Chunk]) -> Result<(), BackendError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let docs = chunks
            .iter()
            .map(|chunk| {
                let doc = serde_json::to_value(chunk)
                    .map_err(|err| BackendError::Unavailable(format!("encoding chunk: {err}")))?;
                Ok((chunk.record_id(), doc))
            })
            .collect::<Result<Vec<_>, BackendError>>()?;
        with_retry("chunks.insert_batch", || {
            self.backend.insert_many(&self.collection, &docs)
        })
        .await?;
        debug!(count = chunks.len(), files_id = %chunks[0].files_id, "wrote chunk batch");
        Ok(())
    }

    /// Lazily yield the chunks of one revision in ascending `num` order.
    ///
    /// Pages of `page_size` records are pulled from the backend by keyset
    /// (`num > last seen`), so consumers never buffer more than one page.
    /// The stream is finite and single-pass; gap and duplicate detection
    /// is the reader's job, since only the reader knows the expected
    /// count.
    pub fn read_ordered(
        &self,
        files_id: Uuid,
        page_size: u32,
    ) -> impl Stream<Item = BucketResult<Chunk>> + Send + use<> {
        let cursor = PageCursor {
            backend: Arc::clone(&self.backend),
            collection: self.collection.clone(),
            field: self.files_id_field.clone(),
            value: Value::String(files_id.to_string()),
            after: None,
            buffered: VecDeque::new(),
            exhausted: false,
            page_size,
        };
        futures::stream::try_unfold(cursor, |mut cursor| async move {
            loop {
                if let Some(chunk) = cursor.buffered.pop_front() {
                    cursor.after = Some(chunk.num);
                    return Ok(Some((chunk, cursor)));
                }
                if cursor.exhausted {
                    return Ok(None);
                }
                let docs = with_retry("chunks.page", || {
                    cursor.backend.find_page(
                        &cursor.collection,
                        &cursor.field,
                        &cursor.value,
                        "num",
                        cursor.after,
                        cursor.page_size,
                    )
                })
                .await?;
                if (docs.len() as u32) < cursor.page_size {
                    cursor.exhausted = true;
                }
                for doc in docs {
                    let chunk: Chunk = serde_json::from_value(doc)
                        .map_err(|err| decode_error("chunk", err))?;
                    cursor.buffered.push_back(chunk);
                }
            }
        })
    }

    /// Delete every chunk owned by `files_id`. Returns the number removed.
    pub async fn delete_for(&self, files_id: Uuid) -> Result<u64, BackendError> {
        let value = Value::String(files_id.to_string());
        with_retry("chunks.delete_for", || {
            self.backend
                .delete_by_index(&self.collection, &self.files_id_field, &value)
        })
        .await
    }

    /// Delete every chunk record in the bucket.
    pub async fn delete_all(&self) -> Result<u64, BackendError> {
        with_retry("chunks.delete_all", || {
            self.backend.delete_all(&self.collection)
        })
        .await
    }
}

struct PageCursor {
    backend: Arc<dyn DocumentStore>,
    collection: String,
    field: String,
    value: Value,
    after: Option<i64>,
    buffered: VecDeque<Chunk>,
    exhausted: bool,
    page_size: u32,
}
