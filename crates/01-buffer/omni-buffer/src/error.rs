//! Error surface for buffer allocation and chunk framing.

use thiserror::Error;

/// Convenience result alias for fallible buffer/chunk operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors surfaced while allocating buffers or parsing chunks out of them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// A pooled or heap allocation could not be satisfied.
    #[error("out of memory allocating {requested} bytes")]
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
    },
    /// The four-character code at the cursor did not match any recognized marker.
    #[error("invalid magic at offset {offset}")]
    InvalidMagic {
        /// Byte offset where the mismatch was observed.
        offset: usize,
    },
    /// A chunk header claims a length that runs past the end of the buffer.
    #[error("chunk at offset {offset} claims length {length} but buffer has {available} bytes remaining")]
    TruncatedChunk {
        /// Byte offset of the chunk header.
        offset: usize,
        /// Length claimed by the chunk header.
        length: u32,
        /// Bytes actually remaining in the buffer from that offset.
        available: usize,
    },
    /// The destination buffer lacks room for an append operation.
    #[error("append of {additional} bytes exceeds destination capacity of {capacity}")]
    CapacityExceeded {
        /// Bytes requested to append.
        additional: usize,
        /// Total capacity of the destination buffer.
        capacity: usize,
    },
    /// A block pool of the requested shape has no free slots right now.
    #[error("block pool exhausted (block_size={block_size}, slot_count={slot_count})")]
    PoolExhausted {
        /// Configured block size of the exhausted pool.
        block_size: usize,
        /// Configured slot count of the exhausted pool.
        slot_count: u32,
    },
}
