//! The `ContainerReader` trait both stream provider variants implement.
//!
//! A small set of synchronous, non-blocking-first methods returning explicit
//! outcomes, so `omni-stream::StreamController` can stay generic over which
//! provider backs it.

use crate::error::ContainerResult;

/// Origin a seek offset is relative to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekFrom {
    /// Relative to the start of the stream.
    Start(u64),
    /// Relative to the current position.
    Current(i64),
    /// Relative to the end of the stream.
    End(i64),
}

/// A source of framed container bytes: either the whole file held in RAM, or
/// a disk-backed reader pulling blocks on demand.
pub trait ContainerReader {
    /// Opens `source_name`, parsing and validating the container header.
    fn open(&mut self, source_name: &str) -> ContainerResult<()>;

    /// Releases any resources tied to the currently open source.
    fn close(&mut self);

    /// Reads up to `dest.len()` bytes, returning the number actually read.
    fn read(&mut self, dest: &mut [u8]) -> ContainerResult<usize>;

    /// Repositions the read cursor, returning the new absolute position.
    fn seek(&mut self, pos: SeekFrom) -> ContainerResult<u64>;

    /// Recommended size, in bytes, of a single streaming buffer, taken from
    /// the container's `MxHd` header.
    fn buffer_size(&self) -> u32;

    /// Number of concurrent buffers the format expects a provider to juggle.
    fn stream_buffer_count(&self) -> u32;

    /// Absolute file offset this provider's own data region begins at, so
    /// callers that indexed the raw container bytes independently (to find
    /// where a given object's stream starts) can translate that absolute
    /// offset into the provider-relative offset `seek` expects.
    fn data_start(&self) -> u64;
}
