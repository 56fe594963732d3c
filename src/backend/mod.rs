//! Storage backend contract.
//!
//! The bucket core never talks to a concrete database; it consumes this
//! minimal document-store surface: named collections of schemaless JSON
//! records with primary-key CRUD, secondary-index equality lookup, and
//! idempotent index creation. A bundled SQLite implementation lives in
//! [`sqlite`]; anything satisfying [`DocumentStore`] can back a bucket.

pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use sqlite::SqliteStore;

/// Failure kinds a backend may surface.
///
/// The core interprets backend failures only through these three kinds;
/// implementation-specific detail travels in the message. `Unavailable` is
/// the only retryable kind.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The addressed record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A write collided with an existing record's primary key.
    #[error("conflict or duplicate: {0}")]
    Conflict(String),

    /// The backend could not be reached or timed out. Transient; safe to
    /// retry for reads and for key-addressed writes.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    /// Whether a bounded retry of the failed operation is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }
}

/// Sort direction for secondary-index lookups.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Minimal CRUD + index contract over two (or more) collections of
/// schemaless records.
///
/// Documents are JSON values addressed by a caller-chosen string primary
/// key. Collection, field, and index identifiers are assumed to have been
/// validated by the caller (the bucket validates them once, at
/// construction).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the collection if it does not exist. Idempotent.
    async fn ensure_collection(&self, collection: &str) -> BackendResult<()>;

    /// Create a secondary index over `field` if it does not exist.
    /// Idempotent; a no-op when the index is already present.
    async fn ensure_index(&self, collection: &str, field: &str) -> BackendResult<()>;

    /// Block until the index over `field` is servable. Pairs with
    /// [`ensure_index`](DocumentStore::ensure_index); backends whose
    /// indexes are ready upon creation return immediately.
    async fn wait_for_index(&self, collection: &str, field: &str) -> BackendResult<()>;

    /// Insert one record. Fails with [`BackendError::Conflict`] if the
    /// primary key is already taken.
    async fn insert(&self, collection: &str, id: &str, doc: Value) -> BackendResult<()>;

    /// Insert a batch of records, replacing any record whose primary key
    /// already exists. Replacement (rather than conflict) makes retried
    /// batches of identically-keyed records safe duplicates.
    async fn insert_many(&self, collection: &str, docs: &[(String, Value)]) -> BackendResult<()>;

    /// Fetch one record by primary key.
    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<Value>>;

    /// Fetch every record whose `field` equals `value`, ordered by the
    /// given `(field, direction)` pairs. Intended for metadata-sized
    /// result sets; chunk reads go through [`find_page`](Self::find_page).
    async fn find_by_index(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        order_by: &[(&str, SortOrder)],
    ) -> BackendResult<Vec<Value>>;

    /// Keyset-paginated equality lookup: records whose `field` equals
    /// `value` and whose numeric `order_field` is strictly greater than
    /// `after` (all records when `None`), ascending, at most `limit`.
    /// Feeds lazy streams without buffering a whole collection slice.
    async fn find_page(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        order_field: &str,
        after: Option<i64>,
        limit: u32,
    ) -> BackendResult<Vec<Value>>;

    /// Delete one record by primary key. Returns the number of records
    /// removed (0 or 1).
    async fn delete(&self, collection: &str, id: &str) -> BackendResult<u64>;

    /// Delete every record whose `field` equals `value`. Returns the
    /// number removed.
    async fn delete_by_index(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> BackendResult<u64>;

    /// Delete every record in the collection. Returns the number removed.
    async fn delete_all(&self, collection: &str) -> BackendResult<u64>;
}
