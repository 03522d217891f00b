use blake3::Hasher;

use super::error::{IntegrityError, IntegrityResult};
use crate::chunk::ChunkHash;

/// BLAKE3 hashing and verification of chunk payloads.
///
/// The digest is a pure function of the bytes: re-hashing retrieved data must
/// reproduce the recorded digest or the chunk is corrupt.
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    /// Compute the digest of a byte slice.
    pub fn digest(data: &[u8]) -> ChunkHash {
        let mut hasher = Hasher::new();
        hasher.update(data);
        ChunkHash::from(*hasher.finalize().as_bytes())
    }

    /// Verify `data` against an expected digest.
    pub fn verify(data: &[u8], expected: &ChunkHash) -> IntegrityResult<()> {
        let actual = Self::digest(data);
        if actual != *expected {
            return Err(IntegrityError::Mismatch {
                expected: *expected,
                actual,
            });
        }
        Ok(())
    }
}
