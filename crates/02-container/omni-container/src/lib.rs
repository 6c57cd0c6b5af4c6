//! Stream providers reading the RIFF-style `OMNI` container format: an
//! in-memory RAM provider and a block-pool-backed Disk provider, both
//! implementing the shared [`ContainerReader`] contract.

mod disk;
mod error;
mod provider;
mod ram;
mod riff;

pub use disk::DiskProvider;
pub use error::{ContainerError, ContainerResult};
pub use provider::{ContainerReader, SeekFrom};
pub use ram::RamProvider;
pub use riff::{
    parse_container, parse_mxda, parse_mxhd, parse_riff_envelope, read_chunk_header,
    riff_total_size, ChunkHeader, ContainerIndex, DirEntry, MxHd, RiffEnvelope, RIFF_HEADER_LEN,
};

#[cfg(feature = "threaded")]
pub use disk::prefetch;
