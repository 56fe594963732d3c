//! Download stream: the verified read path.
//!
//! A download always starts from a committed revision record; chunks are
//! only ever discovered through it, never by scanning the chunks
//! collection. The stream pulls chunks lazily (one backend page at a
//! time), verifies ordering and sizes as it goes, and checks total length
//! and the whole-file digest when the chunk sequence ends. Any violation
//! surfaces as [`BucketError::Corrupted`] and ends the stream; corruption
//! is never retried, since a retry would re-read the same records.
//!
//! The stream is single-pass and not restartable; reopening requires a
//! fresh call on the bucket. A consumer that stops pulling simply stops —
//! reads are non-mutating, so there is nothing to clean up.

use crate::codec::Digester;
use crate::errors::{BucketError, BucketResult};
use crate::models::FileRevision;
use crate::store::ChunkStore;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Chunk records fetched per backend page while streaming.
const CHUNK_PAGE_SIZE: u32 = 8;

/// Lazy, integrity-checked stream over one revision's payload.
pub struct DownloadStream {
    revision: FileRevision,
    inner: BoxStream<'static, BucketResult<Bytes>>,
}

impl DownloadStream {
    /// Open a stream over an already-resolved committed revision.
    pub(crate) fn open(chunks: &ChunkStore, revision: FileRevision) -> Self {
        let inner = verified_chunks(chunks, &revision);
        Self {
            revision,
            inner: inner.boxed(),
        }
    }

    /// Metadata of the revision this stream reads.
    pub fn revision(&self) -> &FileRevision {
        &self.revision
    }

    /// Drain the stream into one contiguous buffer.
    pub async fn read_all(mut self) -> BucketResult<Bytes> {
        let mut buf = BytesMut::with_capacity(self.revision.length.max(0) as usize);
        while let Some(chunk) = self.inner.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl Stream for DownloadStream {
    type Item = BucketResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

struct VerifyState {
    chunks: BoxStream<'static, BucketResult<crate::models::Chunk>>,
    expected_num: i64,
    total_chunks: i64,
    received_bytes: i64,
    length: i64,
    chunk_size: i64,
    digest: String,
    hasher: Option<Digester>,
    finished: bool,
}

/// Wrap the raw chunk stream with order, size, length, and digest checks.
fn verified_chunks(
    store: &ChunkStore,
    revision: &FileRevision,
) -> impl Stream<Item = BucketResult<Bytes>> + Send + use<> {
    let state = VerifyState {
        chunks: store.read_ordered(revision.id, CHUNK_PAGE_SIZE).boxed(),
        expected_num: 0,
        total_chunks: revision.chunk_count(),
        received_bytes: 0,
        length: revision.length,
        chunk_size: revision.chunk_size,
        digest: revision.digest.clone(),
        hasher: Some(Digester::new()),
        finished: false,
    };
    futures::stream::try_unfold(state, |mut state| async move {
        if state.finished {
            return Ok(None);
        }
        match state.chunks.next().await {
            Some(Ok(chunk)) => {
                let data = state.admit(chunk)?;
                Ok(Some((data, state)))
            }
            Some(Err(BucketError::Backend(source))) => {
                Err(BucketError::download_failed(source))
            }
            Some(Err(other)) => Err(other),
            None => {
                state.finished = true;
                state.finish()?;
                Ok(None)
            }
        }
    })
}

impl VerifyState {
    /// Validate one incoming chunk against the expected sequence.
    fn admit(&mut self, chunk: crate::models::Chunk) -> BucketResult<Bytes> {
        if chunk.num != self.expected_num {
            let kind = if chunk.num < self.expected_num {
                "duplicate"
            } else {
                "gap"
            };
            return Err(BucketError::Corrupted(format!(
                "chunk index {kind}: expected {}, got {}",
                self.expected_num, chunk.num
            )));
        }
        if self.expected_num >= self.total_chunks {
            return Err(BucketError::Corrupted(format!(
                "unexpected chunk {} past end of {}-chunk revision",
                chunk.num, self.total_chunks
            )));
        }
        let expected_len = if self.expected_num == self.total_chunks - 1 {
            self.length - self.expected_num * self.chunk_size
        } else {
            self.chunk_size
        };
        if chunk.data.len() as i64 != expected_len {
            return Err(BucketError::Corrupted(format!(
                "chunk {} holds {} bytes, expected {expected_len}",
                chunk.num,
                chunk.data.len()
            )));
        }
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&chunk.data);
        }
        self.received_bytes += chunk.data.len() as i64;
        self.expected_num += 1;
        Ok(Bytes::from(chunk.data))
    }

    /// End-of-sequence checks: every chunk seen, byte count and digest
    /// match the revision record.
    fn finish(&mut self) -> BucketResult<()> {
        if self.expected_num != self.total_chunks {
            return Err(BucketError::Corrupted(format!(
                "revision ended after chunk {} of {}",
                self.expected_num, self.total_chunks
            )));
        }
        if self.received_bytes != self.length {
            return Err(BucketError::Corrupted(format!(
                "reassembled {} bytes, revision records {}",
                self.received_bytes, self.length
            )));
        }
        let actual = self
            .hasher
            .take()
            .map(Digester::finish)
            .unwrap_or_default();
        if actual != self.digest {
            return Err(BucketError::Corrupted(format!(
                "digest mismatch: computed {actual}, revision records {}",
                self.digest
            )));
        }
        Ok(())
    }
}
