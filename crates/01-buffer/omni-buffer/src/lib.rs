//! Buffer and chunk primitives: the reference-counted storage backing every
//! streamed container read, and the chunk framing parsed out of it.

mod buffer;
mod chunk;
mod error;
mod pool;

pub use buffer::{Buffer, BufferMode, VendorState};
pub use chunk::{append_chunk, merge_split_chunks, Chunk, ChunkFlags};
pub use error::{BufferError, BufferResult};
pub use pool::{BlockPool, BlockPoolConfig, BlockPools, PooledBlock};

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(any::<u8>(), 0..64)
    }

    proptest! {
        #[test]
        fn chunk_framing_roundtrips(
            payloads in proptest::collection::vec(payload_strategy(), 1..16),
            times in proptest::collection::vec(any::<i64>(), 16),
        ) {
            let buf = Buffer::from_owned(Vec::new());
            for (i, payload) in payloads.iter().enumerate() {
                append_chunk(&buf, i as u32, times[i], 0, ChunkFlags::default(), payload).unwrap();
            }

            let mut offset = 0;
            let mut seen = 0;
            while offset < buf.len() {
                let chunk = Chunk::read(&buf, offset).unwrap();
                prop_assert_eq!(chunk.object_id(), seen as u32);
                prop_assert_eq!(chunk.time(), times[seen]);
                prop_assert_eq!(chunk.media_to_vec(), payloads[seen].clone());
                offset = chunk.next_offset();
                seen += 1;
            }
            prop_assert_eq!(seen, payloads.len());
        }
    }
}
