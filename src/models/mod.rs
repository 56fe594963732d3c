//! Core data models for the chunked object store.
//!
//! These entities represent the two logical record kinds the bucket keeps
//! in its backing document store: committed file revisions and the ordered
//! chunks holding their payload bytes. They serialize to schemaless JSON
//! documents via `serde`.

pub mod chunk;
pub mod file_revision;

pub use chunk::Chunk;
pub use file_revision::{FileRevision, RevisionStatus};
