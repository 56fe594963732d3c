//! Fault-injecting wrapper around a real document store.

use async_trait::async_trait;
use bucket_store::backend::{BackendError, BackendResult, DocumentStore, SortOrder};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Delegating [`DocumentStore`] that injects `Unavailable` failures at
/// configurable points, for exercising retry, abort, and cleanup paths
/// against an otherwise healthy backend.
pub struct FlakyStore {
    inner: Arc<dyn DocumentStore>,
    /// `insert_many` calls delegated before injection starts.
    insert_many_allowed: i64,
    /// Failing `insert_many` calls injected after that (-1 = forever).
    insert_many_failures: i64,
    insert_many_calls: AtomicI64,
    /// Same scheme for `find_page`.
    find_page_allowed: i64,
    find_page_failures: i64,
    find_page_calls: AtomicI64,
    /// Collections whose strict `insert` always fails.
    fail_insert_collections: HashSet<String>,
    /// Whether `delete_by_index` (abort cleanup) fails.
    fail_delete_by_index: bool,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            insert_many_allowed: i64::MAX,
            insert_many_failures: 0,
            insert_many_calls: AtomicI64::new(0),
            find_page_allowed: i64::MAX,
            find_page_failures: 0,
            find_page_calls: AtomicI64::new(0),
            fail_insert_collections: HashSet::new(),
            fail_delete_by_index: false,
        }
    }

    /// Delegate the first `allowed` `insert_many` calls, then fail the
    /// next `failures` (-1 = every later call).
    pub fn fail_insert_many(mut self, allowed: i64, failures: i64) -> Self {
        self.insert_many_allowed = allowed;
        self.insert_many_failures = failures;
        self
    }

    /// Delegate the first `allowed` `find_page` calls, then fail the next
    /// `failures` (-1 = every later call).
    pub fn fail_find_page(mut self, allowed: i64, failures: i64) -> Self {
        self.find_page_allowed = allowed;
        self.find_page_failures = failures;
        self
    }

    /// Fail every strict `insert` into `collection`.
    pub fn fail_inserts_into(mut self, collection: &str) -> Self {
        self.fail_insert_collections.insert(collection.to_string());
        self
    }

    /// Fail every `delete_by_index` call (abort cleanup).
    pub fn fail_cleanup_deletes(mut self) -> Self {
        self.fail_delete_by_index = true;
        self
    }

    fn injected(op: &str) -> BackendError {
        BackendError::Unavailable(format!("injected {op} failure"))
    }

    fn should_fail(calls: &AtomicI64, allowed: i64, failures: i64) -> bool {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        n >= allowed && (failures < 0 || n < allowed.saturating_add(failures))
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn ensure_collection(&self, collection: &str) -> BackendResult<()> {
        self.inner.ensure_collection(collection).await
    }

    async fn ensure_index(&self, collection: &str, field: &str) -> BackendResult<()> {
        self.inner.ensure_index(collection, field).await
    }

    async fn wait_for_index(&self, collection: &str, field: &str) -> BackendResult<()> {
        self.inner.wait_for_index(collection, field).await
    }

    async fn insert(&self, collection: &str, id: &str, doc: Value) -> BackendResult<()> {
        if self.fail_insert_collections.contains(collection) {
            return Err(Self::injected("insert"));
        }
        self.inner.insert(collection, id, doc).await
    }

    async fn insert_many(&self, collection: &str, docs: &[(String, Value)]) -> BackendResult<()> {
        if Self::should_fail(
            &self.insert_many_calls,
            self.insert_many_allowed,
            self.insert_many_failures,
        ) {
            return Err(Self::injected("insert_many"));
        }
        self.inner.insert_many(collection, docs).await
    }

    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<Value>> {
        self.inner.get(collection, id).await
    }

    async fn find_by_index(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        order_by: &[(&str, SortOrder)],
    ) -> BackendResult<Vec<Value>> {
        self.inner
            .find_by_index(collection, field, value, order_by)
            .await
    }

    async fn find_page(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        order_field: &str,
        after: Option<i64>,
        limit: u32,
    ) -> BackendResult<Vec<Value>> {
        if Self::should_fail(
            &self.find_page_calls,
            self.find_page_allowed,
            self.find_page_failures,
        ) {
            return Err(Self::injected("find_page"));
        }
        self.inner
            .find_page(collection, field, value, order_field, after, limit)
            .await
    }

    async fn delete(&self, collection: &str, id: &str) -> BackendResult<u64> {
        self.inner.delete(collection, id).await
    }

    async fn delete_by_index(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> BackendResult<u64> {
        if self.fail_delete_by_index {
            return Err(Self::injected("delete_by_index"));
        }
        self.inner.delete_by_index(collection, field, value).await
    }

    async fn delete_all(&self, collection: &str) -> BackendResult<u64> {
        self.inner.delete_all(collection).await
    }
}
