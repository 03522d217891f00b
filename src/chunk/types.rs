use bytes::Bytes;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Identity of a chunk on the wire: `(filename, chunk index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    pub file: String,
    pub index: u32,
}

impl ChunkId {
    pub fn new(file: impl Into<String>, index: u32) -> Self {
        Self {
            file: file.into(),
            index,
        }
    }

    /// Stable string form nodes key their storage by.
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file, self.index)
    }
}

/// BLAKE3 digest of a chunk's bytes.
///
/// Serialized as a fixed-length lowercase hex string so records stay stable
/// and comparable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHash([u8; 32]);

impl ChunkHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 32]> for ChunkHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ChunkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ChunkHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChunkHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(&s).map_err(D::Error::custom)?;
        let bytes: [u8; 32] = raw
            .as_slice()
            .try_into()
            .map_err(|_| D::Error::custom(format!("expected 32-byte digest, got {}", raw.len())))?;
        Ok(Self(bytes))
    }
}

/// One span of a file, immutable once computed.
///
/// `index` is 0-based and contiguous within a file; `data` is at most the
/// configured chunk size, and only the last chunk of a file may be shorter.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: u32,
    pub data: Bytes,
    pub hash: ChunkHash,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_display() {
        let id = ChunkId::new("report.pdf", 7);
        assert_eq!(id.to_string(), "report.pdf#7");
        assert_eq!(id.storage_key(), "report.pdf#7");
    }

    #[test]
    fn test_hash_hex_round_trip() {
        let hash = ChunkHash::from([0xab; 32]);
        assert_eq!(hash.to_hex().len(), 64);

        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));

        let back: ChunkHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_hash_rejects_wrong_length() {
        let result: Result<ChunkHash, _> = serde_json::from_str("\"abcd\"");
        assert!(result.is_err());
    }
}
