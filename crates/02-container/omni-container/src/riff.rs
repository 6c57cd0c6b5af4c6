//! Bit-exact parsing of the RIFF-style `OMNI` container: `RIFF`/`OMNI` at the
//! top, a `MxHd` header chunk, and a `LIST`/`MxDa` holding `MxOb` action
//! objects and `MxCh` stream chunks.

use crate::error::ContainerError;

/// Generic RIFF chunk framing: four-character code, `u32` size, even-padded.
pub const RIFF_HEADER_LEN: usize = 8;

/// Total on-wire size of a RIFF-style chunk given its declared payload size.
pub const fn riff_total_size(size: u32) -> usize {
    RIFF_HEADER_LEN + size as usize + (size & 1) as usize
}

fn read_fourcc(bytes: &[u8], offset: usize) -> Result<[u8; 4], ContainerError> {
    bytes
        .get(offset..offset + 4)
        .map(|s| [s[0], s[1], s[2], s[3]])
        .ok_or(ContainerError::CannotRead {
            offset,
            requested: 4,
        })
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, ContainerError> {
    bytes
        .get(offset..offset + 4)
        .map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
        .ok_or(ContainerError::CannotRead {
            offset,
            requested: 4,
        })
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, ContainerError> {
    bytes
        .get(offset..offset + 2)
        .map(|s| u16::from_le_bytes([s[0], s[1]]))
        .ok_or(ContainerError::CannotRead {
            offset,
            requested: 2,
        })
}

fn expect_fourcc(bytes: &[u8], offset: usize, expected: &'static str) -> Result<(), ContainerError> {
    let found = read_fourcc(bytes, offset)?;
    if &found != expected.as_bytes() {
        return Err(ContainerError::InvalidMagic {
            offset,
            found,
            expected,
        });
    }
    Ok(())
}

/// A generic RIFF chunk header: its four-character code and declared payload size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    /// The chunk's four-character code.
    pub id: [u8; 4],
    /// Declared payload size, not including padding.
    pub size: u32,
}

/// Reads a generic chunk header at `offset`.
pub fn read_chunk_header(bytes: &[u8], offset: usize) -> Result<ChunkHeader, ContainerError> {
    let id = read_fourcc(bytes, offset)?;
    let size = read_u32(bytes, offset + 4)?;
    Ok(ChunkHeader { id, size })
}

/// The `MxHd` header chunk: format version, recommended buffer size, and the
/// number of concurrent stream buffers the format expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MxHd {
    /// Major format version. Only `2` is understood.
    pub major: u16,
    /// Minor format version. Only `2` is understood.
    pub minor: u16,
    /// Recommended size, in bytes, of a single streaming buffer.
    pub buffer_size: u32,
    /// Number of concurrent buffers the format expects a provider to juggle.
    pub stream_buffer_count: u32,
}

const SUPPORTED_MAJOR: u16 = 2;
const SUPPORTED_MINOR: u16 = 2;

/// Parses the `MxHd` chunk at `offset`, verifying its magic and version.
pub fn parse_mxhd(bytes: &[u8], offset: usize) -> Result<(MxHd, usize), ContainerError> {
    expect_fourcc(bytes, offset, "MxHd")?;
    let header = read_chunk_header(bytes, offset)?;
    let payload = offset + RIFF_HEADER_LEN;
    let major = read_u16(bytes, payload)?;
    let minor = read_u16(bytes, payload + 2)?;
    if major != SUPPORTED_MAJOR || minor != SUPPORTED_MINOR {
        return Err(ContainerError::UnsupportedVersion { major, minor });
    }
    let buffer_size = read_u32(bytes, payload + 4)?;
    let stream_buffer_count = read_u32(bytes, payload + 8)?;
    let next = offset + riff_total_size(header.size);
    Ok((
        MxHd {
            major,
            minor,
            buffer_size,
            stream_buffer_count,
        },
        next,
    ))
}

/// Top-level envelope: `RIFF` size, and the four-character form type (`OMNI`).
pub struct RiffEnvelope {
    /// Offset of the first byte after the `RIFF`/size/form-type preamble.
    pub content_offset: usize,
    /// Offset one past the end of the RIFF's declared content.
    pub content_end: usize,
}

/// Parses the outermost `RIFF`/`OMNI` wrapper.
pub fn parse_riff_envelope(bytes: &[u8]) -> Result<RiffEnvelope, ContainerError> {
    expect_fourcc(bytes, 0, "RIFF")?;
    let size = read_u32(bytes, 4)?;
    expect_fourcc(bytes, 8, "OMNI")?;
    let content_offset = 12;
    let content_end = 8 + riff_total_size(size).min(bytes.len());
    Ok(RiffEnvelope {
        content_offset,
        content_end,
    })
}

/// One entry discovered while walking the `LIST`/`MxDa` body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirEntry {
    /// An `MxOb` action object, given as an offset to its serialized payload and its length.
    Object { payload_offset: usize, len: u32 },
    /// An `MxCh` stream chunk, given as the offset of its own `MxCh` header.
    StreamChunk { header_offset: usize },
}

/// Parses the `LIST`/`MxDa` body, returning every `MxOb`/`MxCh` entry found in order.
pub fn parse_mxda(bytes: &[u8], offset: usize) -> Result<(Vec<DirEntry>, usize), ContainerError> {
    expect_fourcc(bytes, offset, "LIST")?;
    let header = read_chunk_header(bytes, offset)?;
    expect_fourcc(bytes, offset + RIFF_HEADER_LEN, "MxDa")?;
    let list_end = offset + riff_total_size(header.size);

    let mut entries = Vec::new();
    let mut cursor = offset + RIFF_HEADER_LEN + 4;
    while cursor + RIFF_HEADER_LEN <= list_end {
        let entry_header = read_chunk_header(bytes, cursor)?;
        match &entry_header.id {
            b"MxOb" => entries.push(DirEntry::Object {
                payload_offset: cursor + RIFF_HEADER_LEN,
                len: entry_header.size,
            }),
            b"MxCh" => entries.push(DirEntry::StreamChunk {
                header_offset: cursor,
            }),
            _ => {
                return Err(ContainerError::InvalidMagic {
                    offset: cursor,
                    found: entry_header.id,
                    expected: "MxOb|MxCh",
                })
            }
        }
        cursor += riff_total_size(entry_header.size);
    }
    Ok((entries, list_end))
}

/// A fully-indexed view of a container's structure: its header and the
/// ordered list of objects/chunks found in its data list.
pub struct ContainerIndex {
    /// Parsed `MxHd` header.
    pub header: MxHd,
    /// Entries discovered in the `LIST`/`MxDa` body, in file order.
    pub entries: Vec<DirEntry>,
}

/// Parses an entire in-memory container, validating every chunk along the way.
pub fn parse_container(bytes: &[u8]) -> Result<ContainerIndex, ContainerError> {
    let envelope = parse_riff_envelope(bytes)?;
    let (header, after_hd) = parse_mxhd(bytes, envelope.content_offset)?;
    let (entries, _) = parse_mxda(bytes, after_hd)?;
    let _ = envelope.content_end;
    Ok(ContainerIndex { header, entries })
}

impl ContainerIndex {
    /// Absolute file offset of the first `MxCh` entry in the data list, if any.
    ///
    /// A controller opening a fresh provider seeks here once: a single
    /// stream's chunks interleave by object id and are routed to whichever
    /// subscribers match, so there is no need to seek separately per action
    /// sharing the same source.
    pub fn first_stream_chunk_offset(&self) -> Option<usize> {
        self.entries.iter().find_map(|entry| match entry {
            DirEntry::StreamChunk { header_offset } => Some(*header_offset),
            DirEntry::Object { .. } => None,
        })
    }
}
