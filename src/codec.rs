//! Chunk codec: deterministic payload splitting and integrity digests.

use bytes::Bytes;

/// Split `payload` into `ceil(len / chunk_size)` ordered chunks of
/// `chunk_size` bytes each, the final chunk truncated to the remainder
/// (never padded). Slices are zero-copy views into the payload. An empty
/// payload yields no chunks; that is a valid zero-chunk file, not an
/// error.
///
/// Callers must have validated `chunk_size > 0`.
pub fn split(payload: &Bytes, chunk_size: usize) -> impl Iterator<Item = (i64, Bytes)> + '_ {
    debug_assert!(chunk_size > 0);
    (0..payload.len())
        .step_by(chunk_size)
        .enumerate()
        .map(move |(num, start)| {
            let end = usize::min(start + chunk_size, payload.len());
            (num as i64, payload.slice(start..end))
        })
}

/// Hex digest of a complete payload. Computed once over the whole payload
/// before splitting, stored on the revision, and re-checked on download.
pub fn digest(payload: &[u8]) -> String {
    format!("{:x}", md5::compute(payload))
}

/// Incremental digest over a chunk sequence, for verifying a reassembled
/// download without buffering it.
pub struct Digester {
    inner: md5::Context,
}

impl Digester {
    pub fn new() -> Self {
        Self {
            inner: md5::Context::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.consume(data);
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.inner.compute())
    }
}

impl Default for Digester {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `payload` hashes to `expected`.
pub fn verify(expected: &str, payload: &[u8]) -> bool {
    digest(payload) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> Bytes {
        (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
    }

    fn reassemble(chunks: impl Iterator<Item = (i64, Bytes)>) -> Vec<u8> {
        let mut out = Vec::new();
        for (_, data) in chunks {
            out.extend_from_slice(&data);
        }
        out
    }

    #[test]
    fn split_then_reassemble_is_identity() {
        for len in [0, 1, 1023, 1024, 1025, 3072, 10_000] {
            for chunk_size in [1, 7, 1024, 100_000] {
                let p = payload(len);
                assert_eq!(
                    reassemble(split(&p, chunk_size)),
                    p.as_ref(),
                    "len={len} chunk_size={chunk_size}"
                );
            }
        }
    }

    #[test]
    fn chunk_count_and_sizes() {
        let p = payload(1536);
        let chunks: Vec<_> = split(&p, 1024).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].0, 0);
        assert_eq!(chunks[0].1.len(), 1024);
        assert_eq!(chunks[1].0, 1);
        assert_eq!(chunks[1].1.len(), 512);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let p = payload(2048);
        let chunks: Vec<_> = split(&p, 1024).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].1.len(), 1024);
    }

    #[test]
    fn empty_payload_yields_zero_chunks() {
        let p = Bytes::new();
        assert_eq!(split(&p, 1024).count(), 0);
        assert!(verify(&digest(&[]), &[]));
    }

    #[test]
    fn digest_survives_split_and_reassembly() {
        let p = payload(5000);
        let whole = digest(&p);
        for chunk_size in [1, 64, 4999, 5000, 9999] {
            assert_eq!(digest(&reassemble(split(&p, chunk_size))), whole);
        }
    }

    #[test]
    fn incremental_digest_matches_whole() {
        let p = payload(5000);
        let mut inc = Digester::new();
        for (_, chunk) in split(&p, 123) {
            inc.update(&chunk);
        }
        assert_eq!(inc.finish(), digest(&p));
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let p = payload(100);
        let d = digest(&p);
        let mut tampered = p.to_vec();
        tampered[50] ^= 0xff;
        assert!(!verify(&d, &tampered));
    }
}
