//! Chunked binary object store over a pluggable document store.
//!
//! A [`Bucket`] lets callers upload arbitrarily large files by splitting
//! them into fixed-size chunks, retrieve files by name (optionally a
//! specific revision), list revisions, and reset the bucket's contents.
//! The backing store is anything implementing [`backend::DocumentStore`];
//! a SQLite implementation is bundled.
//!
//! The store offers no transactions across the two collections involved,
//! so visibility is gated by write order instead: an upload writes every
//! chunk first, under an id no reader can discover, and becomes visible
//! atomically when its single revision record lands. Readers always
//! traverse metadata → chunks, never the reverse.
//!
//! ```no_run
//! use bucket_store::{Bucket, BucketConfig, backend::SqliteStore};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! # async fn demo() -> bucket_store::BucketResult<()> {
//! let store = Arc::new(SqliteStore::connect("sqlite://bucket.db").await?);
//! let bucket = Bucket::new(store, BucketConfig::default())?;
//! bucket.mount().await?;
//!
//! let revision = bucket.upload("report.pdf", Bytes::from_static(b"...")).await?;
//! let bytes = bucket.download("report.pdf").await?;
//! # let _ = (revision, bytes);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod bucket;
pub mod codec;
pub mod config;
pub mod download;
pub mod errors;
pub mod models;
pub mod store;
pub mod upload;

pub use backend::{BackendError, DocumentStore};
pub use bucket::Bucket;
pub use config::BucketConfig;
pub use download::DownloadStream;
pub use errors::{BucketError, BucketResult};
pub use models::{Chunk, FileRevision, RevisionStatus};
pub use upload::UploadSession;
