use bytes::{Bytes, BytesMut};

use super::error::{ChunkError, ChunkResult};
use super::types::Chunk;
use crate::integrity::IntegrityVerifier;

/// Splits byte buffers into fixed-size chunks and reassembles them.
///
/// Pure: the same input always produces the same chunk sequence and hashes,
/// and no state is carried between calls.
pub struct Partitioner {
    chunk_size: usize,
}

impl Partitioner {
    pub fn new(chunk_size: usize) -> ChunkResult<Self> {
        if chunk_size == 0 {
            return Err(ChunkError::InvalidChunkSize(chunk_size));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `data` into consecutive, non-overlapping spans of `chunk_size`
    /// bytes, the final span taking the remainder. Indices ascend from 0.
    /// A zero-length input yields an empty sequence.
    pub fn partition(&self, data: &[u8]) -> Vec<Chunk> {
        let data = Bytes::copy_from_slice(data);
        let mut chunks = Vec::with_capacity(data.len().div_ceil(self.chunk_size));
        let mut offset = 0;

        while offset < data.len() {
            let end = std::cmp::min(offset + self.chunk_size, data.len());
            let span = data.slice(offset..end);
            let hash = IntegrityVerifier::digest(&span);

            chunks.push(Chunk {
                index: chunks.len() as u32,
                data: span,
                hash,
            });
            offset = end;
        }

        chunks
    }

    /// Concatenate chunks in index order back into the original buffer.
    ///
    /// Accepts chunks in any order; the sequence must be contiguous from 0.
    pub fn reassemble(mut chunks: Vec<Chunk>) -> ChunkResult<Bytes> {
        chunks.sort_by_key(|c| c.index);

        let total: usize = chunks.iter().map(|c| c.len()).sum();
        let mut out = BytesMut::with_capacity(total);

        for (position, chunk) in chunks.iter().enumerate() {
            if chunk.index as usize != position {
                return Err(ChunkError::MissingChunk(position as u32));
            }
            out.extend_from_slice(&chunk.data);
        }

        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 256) as u8).collect()
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        assert!(matches!(
            Partitioner::new(0),
            Err(ChunkError::InvalidChunkSize(0))
        ));
    }

    #[test]
    fn test_partition_exact_multiple() {
        let partitioner = Partitioner::new(4).unwrap();
        let chunks = partitioner.partition(&patterned(12));

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 4));
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_partition_remainder_tail() {
        let partitioner = Partitioner::new(5).unwrap();
        let chunks = partitioner.partition(&patterned(12));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 5);
        assert_eq!(chunks[1].len(), 5);
        assert_eq!(chunks[2].len(), 2);
    }

    #[test]
    fn test_partition_input_smaller_than_chunk() {
        let partitioner = Partitioner::new(1024).unwrap();
        let chunks = partitioner.partition(b"tiny");

        assert_eq!(chunks.len(), 1);
        assert_eq!(&chunks[0].data[..], b"tiny");
    }

    #[test]
    fn test_partition_empty_input() {
        let partitioner = Partitioner::new(1024).unwrap();
        assert!(partitioner.partition(&[]).is_empty());
    }

    #[test]
    fn test_identical_spans_hash_identically() {
        let partitioner = Partitioner::new(4).unwrap();
        let chunks = partitioner.partition(b"abcdabcdabcx");

        assert_eq!(chunks[0].hash, chunks[1].hash);
        assert_ne!(chunks[0].hash, chunks[2].hash);
    }

    #[test]
    fn test_hash_matches_recomputed_digest() {
        let partitioner = Partitioner::new(8).unwrap();
        for chunk in partitioner.partition(&patterned(100)) {
            assert_eq!(chunk.hash, IntegrityVerifier::digest(&chunk.data));
        }
    }

    #[test]
    fn test_round_trip_reproduces_input() {
        for (len, size) in [(0, 7), (1, 7), (6, 7), (7, 7), (8, 7), (1000, 64)] {
            let data = patterned(len);
            let partitioner = Partitioner::new(size).unwrap();
            let chunks = partitioner.partition(&data);
            let rebuilt = Partitioner::reassemble(chunks).unwrap();
            assert_eq!(&rebuilt[..], &data[..], "len={len} size={size}");
        }
    }

    #[test]
    fn test_reassemble_out_of_order() {
        let partitioner = Partitioner::new(3).unwrap();
        let data = patterned(10);
        let mut chunks = partitioner.partition(&data);
        chunks.reverse();

        let rebuilt = Partitioner::reassemble(chunks).unwrap();
        assert_eq!(&rebuilt[..], &data[..]);
    }

    #[test]
    fn test_reassemble_detects_gap() {
        let partitioner = Partitioner::new(3).unwrap();
        let mut chunks = partitioner.partition(&patterned(10));
        chunks.remove(1);

        assert!(matches!(
            Partitioner::reassemble(chunks),
            Err(ChunkError::MissingChunk(1))
        ));
    }
}
