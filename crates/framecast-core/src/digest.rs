//! Content digests for logs and transfer summaries.
//!
//! Digests are informational only. The protocol trusts decoded chunk text
//! and never verifies a digest before reassembly.

/// BLAKE3 digest of a byte string.
pub type Digest = [u8; 32];

pub fn hash(data: &[u8]) -> Digest {
    *blake3::hash(data).as_bytes()
}

/// First 8 bytes, hex-encoded. Enough to compare two ends by eye.
pub fn short_hex(digest: &Digest) -> String {
    hex::encode(&digest[..8])
}
