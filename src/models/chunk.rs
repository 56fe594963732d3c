//! Represents one ordered slice of a revision's payload.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single chunk of raw payload bytes.
///
/// Chunks are exclusively owned by their revision: they are written before
/// the revision record exists (under a candidate `files_id` no reader can
/// discover) and deleted together with it. Every chunk of a revision holds
/// exactly `chunk_size` bytes except possibly the last, which holds the
/// remainder and is never padded.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Chunk {
    /// Id of the owning [`FileRevision`](super::FileRevision).
    pub files_id: Uuid,

    /// 0-based position of this chunk within the payload. Unique per
    /// `files_id`; the committed set is always `0..chunk_count` with no
    /// gaps.
    pub num: i64,

    /// Raw payload bytes, carried as base64 inside the stored document.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Chunk {
    /// Deterministic primary key for this chunk's record.
    ///
    /// Keying chunks by `(files_id, num)` makes a retried batch insert an
    /// overwrite of identical data rather than a duplicate row.
    pub fn record_id(&self) -> String {
        record_id(&self.files_id, self.num)
    }
}

/// Primary key of the chunk record at position `num` of revision
/// `files_id`.
pub fn record_id(files_id: &Uuid, num: i64) -> String {
    format!("{}:{}", files_id, num)
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(data: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(de)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_round_trips_through_base64_document() {
        let chunk = Chunk {
            files_id: Uuid::new_v4(),
            num: 3,
            data: vec![0, 1, 2, 255, 254],
        };
        let doc = serde_json::to_value(&chunk).unwrap();
        assert!(doc["data"].is_string());
        let back: Chunk = serde_json::from_value(doc).unwrap();
        assert_eq!(back, chunk);
    }

    #[test]
    fn record_id_is_stable_per_position() {
        let id = Uuid::new_v4();
        let chunk = Chunk {
            files_id: id,
            num: 7,
            data: vec![],
        };
        assert_eq!(chunk.record_id(), format!("{id}:7"));
        assert_eq!(chunk.record_id(), record_id(&id, 7));
    }
}
