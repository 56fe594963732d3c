//! Shared helpers for bucket integration tests.
#![allow(dead_code)]

pub mod mocks;

use bucket_store::backend::SqliteStore;
use bucket_store::{Bucket, BucketConfig, DocumentStore};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Chunk size used by most tests.
pub const CHUNK: usize = 1024;

/// Deterministic payload of `len` bytes.
pub fn payload(len: usize) -> Bytes {
    (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
}

/// Honor `RUST_LOG` in test runs; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Mounted bucket over a fresh in-memory store, plus the store itself so
/// tests can inspect raw records.
pub async fn test_bucket(chunk_size: usize) -> (Bucket, Arc<SqliteStore>) {
    init_tracing();
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let backend: Arc<dyn DocumentStore> = store.clone();
    let bucket = Bucket::new(backend, BucketConfig::with_chunk_size(chunk_size)).unwrap();
    bucket.mount().await.unwrap();
    (bucket, store)
}

/// Mounted bucket over an arbitrary backend.
pub async fn bucket_over(backend: Arc<dyn DocumentStore>, config: BucketConfig) -> Bucket {
    init_tracing();
    let bucket = Bucket::new(backend, config).unwrap();
    bucket.mount().await.unwrap();
    bucket
}

/// Raw chunk documents for one revision, ascending by position.
pub async fn raw_chunks(store: &SqliteStore, files_id: Uuid) -> Vec<Value> {
    store
        .find_page(
            "fs_chunks",
            "files_id",
            &Value::String(files_id.to_string()),
            "num",
            None,
            u32::MAX,
        )
        .await
        .unwrap()
}
