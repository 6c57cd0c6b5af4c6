//! Errors surfaced by container parsing and stream providers.

use thiserror::Error;

/// Convenience result alias for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors a [`crate::provider::StreamProvider`] or the RIFF parser can raise.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerError {
    /// The named source could not be opened at all.
    #[error("cannot open source {source_name:?}")]
    CannotOpen {
        /// Name passed to `open`.
        source_name: String,
    },
    /// A read past the bytes actually available.
    #[error("cannot read {requested} bytes at offset {offset}")]
    CannotRead {
        /// Offset the read started at.
        offset: usize,
        /// Number of bytes requested.
        requested: usize,
    },
    /// A lookup for a specific chunk found no match.
    #[error("chunk not found for object {object_id} sub {sub_id}")]
    ChunkNotFound {
        /// Logical object id searched for.
        object_id: u32,
        /// Sub-channel id searched for.
        sub_id: u32,
    },
    /// The container header names a version this reader does not understand.
    #[error("unsupported container version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version found in `MxHd`.
        major: u16,
        /// Minor version found in `MxHd`.
        minor: u16,
    },
    /// A four-character code did not match what was expected at that position.
    #[error("invalid magic {found:?} at offset {offset}, expected {expected:?}")]
    InvalidMagic {
        /// Byte offset where the mismatch was observed.
        offset: usize,
        /// The four bytes actually found.
        found: [u8; 4],
        /// The four-character code that was expected.
        expected: &'static str,
    },
    /// A chunk's declared length runs past the bytes actually available.
    #[error("truncated chunk at offset {offset}: declared {declared} bytes, {available} available")]
    TruncatedChunk {
        /// Offset of the chunk header.
        offset: usize,
        /// Length the chunk header declared.
        declared: u32,
        /// Bytes actually available from that offset.
        available: usize,
    },
}
