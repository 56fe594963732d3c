//! Bucket configuration.

use crate::backend::sqlite::ident_safe;
use crate::errors::{BucketError, BucketResult};

/// Default chunk size: 255 KiB, the conventional size for chunked file
/// stores of this shape.
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 255 * 1024;

/// Default number of chunks written per backend batch insert.
pub const DEFAULT_CHUNK_BATCH_SIZE: usize = 16;

/// Immutable configuration for one bucket instance.
///
/// A `BucketConfig` is a plain value: it is validated once when handed to
/// [`Bucket::new`](crate::Bucket::new) and never mutated afterwards, so any
/// number of operations (and bucket instances) can share it concurrently
/// without locks.
#[derive(Clone, Debug)]
pub struct BucketConfig {
    /// Bytes per chunk for new uploads. Must be positive. Existing
    /// revisions keep the chunk size they were written with.
    pub chunk_size_bytes: usize,

    /// Chunks per `insert_many` batch during upload.
    pub chunk_batch_size: usize,

    /// Backing collection holding committed revision records.
    pub files_collection: String,

    /// Backing collection holding chunk records.
    pub chunks_collection: String,

    /// Indexed field on the files collection used for revision lookup.
    pub filename_field: String,

    /// Indexed field on the chunks collection used for chunk retrieval.
    pub files_id_field: String,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            chunk_batch_size: DEFAULT_CHUNK_BATCH_SIZE,
            files_collection: "fs_files".into(),
            chunks_collection: "fs_chunks".into(),
            filename_field: "filename".into(),
            files_id_field: "files_id".into(),
        }
    }
}

impl BucketConfig {
    /// Default configuration with a caller-chosen chunk size.
    pub fn with_chunk_size(chunk_size_bytes: usize) -> Self {
        Self {
            chunk_size_bytes,
            ..Self::default()
        }
    }

    /// Check the configuration is usable: positive sizes, identifier-safe
    /// collection and field names.
    pub fn validate(&self) -> BucketResult<()> {
        if self.chunk_size_bytes == 0 {
            return Err(BucketError::InvalidChunkSize(self.chunk_size_bytes as i64));
        }
        if self.chunk_batch_size == 0 {
            return Err(BucketError::InvalidConfig(
                "chunk_batch_size must be positive".into(),
            ));
        }
        for (what, name) in [
            ("files_collection", &self.files_collection),
            ("chunks_collection", &self.chunks_collection),
            ("filename_field", &self.filename_field),
            ("files_id_field", &self.files_id_field),
        ] {
            if !ident_safe(name) {
                return Err(BucketError::InvalidConfig(format!(
                    "{what} `{name}` must be a plain identifier"
                )));
            }
        }
        if self.files_collection == self.chunks_collection {
            return Err(BucketError::InvalidConfig(
                "files and chunks collections must be distinct".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(BucketConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let cfg = BucketConfig::with_chunk_size(0);
        assert!(matches!(
            cfg.validate(),
            Err(BucketError::InvalidChunkSize(0))
        ));
    }

    #[test]
    fn unsafe_collection_name_rejected() {
        let cfg = BucketConfig {
            files_collection: "fs files; drop".into(),
            ..BucketConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(BucketError::InvalidConfig(_))));
    }

    #[test]
    fn colliding_collections_rejected() {
        let cfg = BucketConfig {
            chunks_collection: "fs_files".into(),
            ..BucketConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(BucketError::InvalidConfig(_))));
    }
}
