//! Upload session: the write path's state machine.
//!
//! A session writes all chunk records first, under a candidate `files_id`
//! no reader can discover, and makes the upload visible with a single
//! revision-record insert at the end. There is no persisted intermediate
//! state and no lock: two sessions for the same filename run fully
//! independently under distinct candidate ids, and both may commit as
//! separate revisions.
//!
//! Dropping the future driving a session stops it at the next backend
//! call; nothing written so far is reachable by readers, so cancellation
//! needs no coordination (orphaned chunks are inert, see [`abort`]).
//!
//! [`abort`]: UploadSession::abort

use crate::codec;
use crate::errors::{BucketError, BucketResult};
use crate::models::{Chunk, FileRevision, RevisionStatus};
use crate::store::{ChunkStore, FileRevisionStore};
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session lifecycle.
///
/// `Started → Chunking → AwaitingCommit → Committed`, with `Aborted`
/// terminal reachable from `Chunking` and `AwaitingCommit`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum UploadState {
    Started,
    Chunking,
    AwaitingCommit,
    Committed,
    Aborted,
}

/// One upload of one payload under one candidate revision id.
pub struct UploadSession {
    files: FileRevisionStore,
    chunks: ChunkStore,
    filename: String,
    chunk_size: usize,
    batch_size: usize,
    files_id: Uuid,
    state: UploadState,
}

impl UploadSession {
    pub(crate) fn new(
        files: FileRevisionStore,
        chunks: ChunkStore,
        filename: String,
        chunk_size: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            files,
            chunks,
            filename,
            chunk_size,
            batch_size,
            files_id: Uuid::new_v4(),
            state: UploadState::Started,
        }
    }

    /// Drive the session to completion, returning the committed revision.
    ///
    /// An empty payload is a valid zero-chunk file. On any terminal
    /// failure the session transitions to `Aborted` and best-effort
    /// deletes the chunks already written under its candidate id.
    pub async fn run(mut self, payload: Bytes) -> BucketResult<FileRevision> {
        if self.chunk_size == 0 {
            return Err(BucketError::InvalidChunkSize(self.chunk_size as i64));
        }
        let digest = codec::digest(&payload);
        debug!(files_id = %self.files_id, filename = %self.filename, len = payload.len(),
            "upload session started");

        self.transition(UploadState::Chunking);
        let mut batch = Vec::with_capacity(self.batch_size);
        for (num, data) in codec::split(&payload, self.chunk_size) {
            batch.push(Chunk {
                files_id: self.files_id,
                num,
                data: data.to_vec(),
            });
            if batch.len() == self.batch_size {
                self.write_batch(&batch).await?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.write_batch(&batch).await?;
        }

        self.transition(UploadState::AwaitingCommit);
        let revision = FileRevision {
            id: self.files_id,
            filename: self.filename.clone(),
            length: payload.len() as i64,
            chunk_size: self.chunk_size as i64,
            uploaded_at: Utc::now(),
            digest,
            status: RevisionStatus::Committed,
        };
        match self.files.insert(&revision).await {
            Ok(()) => {
                self.transition(UploadState::Committed);
                info!(id = %revision.id, filename = %revision.filename,
                    length = revision.length, "upload committed");
                Ok(revision)
            }
            Err(BucketError::Backend(source)) => {
                self.abort().await;
                Err(BucketError::upload_failed(source))
            }
            Err(other) => {
                self.abort().await;
                Err(other)
            }
        }
    }

    /// Move to `next`, asserting the step is one the machine allows.
    fn transition(&mut self, next: UploadState) {
        debug_assert!(
            matches!(
                (self.state, next),
                (UploadState::Started, UploadState::Chunking)
                    | (UploadState::Chunking, UploadState::AwaitingCommit)
                    | (UploadState::AwaitingCommit, UploadState::Committed)
                    | (
                        UploadState::Chunking | UploadState::AwaitingCommit,
                        UploadState::Aborted
                    )
            ),
            "invalid upload transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    async fn write_batch(&mut self, batch: &[Chunk]) -> BucketResult<()> {
        match self.chunks.insert_batch(batch).await {
            Ok(()) => Ok(()),
            Err(source) => {
                self.abort().await;
                Err(BucketError::upload_failed(source))
            }
        }
    }

    /// Transition to `Aborted` and best-effort delete the chunks written
    /// under the candidate id. Cleanup is advisory: if the delete itself
    /// fails, the leftover chunks are unreachable from any revision record
    /// and are left to an out-of-band maintenance sweep.
    async fn abort(&mut self) {
        self.transition(UploadState::Aborted);
        match self.chunks.delete_for(self.files_id).await {
            Ok(removed) => {
                debug!(files_id = %self.files_id, removed, "aborted upload cleaned up");
            }
            Err(err) => {
                warn!(files_id = %self.files_id, error = %err,
                    "aborted upload left orphan chunks behind");
            }
        }
    }
}
