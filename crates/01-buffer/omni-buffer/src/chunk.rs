//! Chunk framing over a [`Buffer`](crate::buffer::Buffer): the `MxCh` header
//! layout and the exact size arithmetic the original stream format used.

use crate::buffer::Buffer;
use crate::error::{BufferError, BufferResult};

/// Four-character code every stream chunk starts with.
const MAGIC: &[u8; 4] = b"MxCh";

/// Generic chunk header: a four-character code followed by a `u32` payload length.
const HEADER_LEN: usize = 8;

/// Chunk-specific fields carried at the front of the payload: object id,
/// timestamp, flags, and sub-channel id.
const INNER_HEADER_LEN: usize = 16;

/// Bit flags carried in a chunk's flag word. Hand-rolled rather than pulled
/// from a crate since the wire layout is a fixed bit pattern dictated by the
/// container format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ChunkFlags(u16);

impl ChunkFlags {
    /// The chunk owns a private copy of its data rather than aliasing the source buffer.
    pub const OWNED_DATA: ChunkFlags = ChunkFlags(0x01);
    /// This is the final chunk of the stream.
    pub const END_OF_STREAM: ChunkFlags = ChunkFlags(0x02);
    /// Reserved bit, preserved for round-trip fidelity.
    pub const BIT3: ChunkFlags = ChunkFlags(0x04);
    /// The chunk is one fragment of a value split across multiple chunks.
    pub const SPLIT: ChunkFlags = ChunkFlags(0x10);
    /// Vendor/codec-specific payload, opaque to the stream controller.
    pub const VENDOR: ChunkFlags = ChunkFlags(0x8000);

    /// Builds a flag set from a raw bit pattern.
    pub const fn from_bits(bits: u16) -> Self {
        ChunkFlags(bits)
    }

    /// Returns the raw bit pattern.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether all bits of `other` are set.
    pub const fn contains(self, other: ChunkFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns a new flag set with `other`'s bits set.
    pub const fn with(self, other: ChunkFlags) -> Self {
        ChunkFlags(self.0 | other.0)
    }
}

impl std::ops::BitOr for ChunkFlags {
    type Output = ChunkFlags;
    fn bitor(self, rhs: ChunkFlags) -> ChunkFlags {
        self.with(rhs)
    }
}

/// A view into a region of a [`Buffer`] framed as a single `MxCh` chunk.
///
/// A `Chunk` does not own bytes; it borrows a cheap clone of the underlying
/// `Buffer` handle and remembers where its header and payload live, rather
/// than copying payload bytes on every parse.
#[derive(Clone)]
pub struct Chunk {
    buffer: Buffer,
    header_offset: usize,
    object_id: u32,
    time: i64,
    flags: ChunkFlags,
    sub_id: u16,
    payload_length: u32,
    media_offset: usize,
    media_len: usize,
}

impl Chunk {
    /// Total size in bytes of a chunk's on-wire framing, given the length of
    /// its payload (inner header + media): `8 + length + (length & 1)`,
    /// confirmed against the original container format's `Size()` helper
    /// (pad to an even boundary).
    pub const fn size_from_header(length: u32) -> usize {
        HEADER_LEN + length as usize + (length & 1) as usize
    }

    /// Parses a chunk at `offset` within `buffer`, verifying the leading
    /// four bytes are `MxCh`, and advancing past the inner object/time/flags
    /// header to locate the media payload.
    pub fn read(buffer: &Buffer, offset: usize) -> BufferResult<Chunk> {
        let available = buffer.len().saturating_sub(offset);
        if available < HEADER_LEN {
            return Err(BufferError::TruncatedChunk {
                offset,
                length: 0,
                available,
            });
        }

        let (magic, payload_length) = buffer.with_slice(|bytes| {
            let h = &bytes[offset..offset + HEADER_LEN];
            let mut magic = [0u8; 4];
            magic.copy_from_slice(&h[0..4]);
            let length = u32::from_le_bytes([h[4], h[5], h[6], h[7]]);
            (magic, length)
        });
        if &magic != MAGIC {
            return Err(BufferError::InvalidMagic { offset });
        }

        let payload_start = offset + HEADER_LEN;
        let payload_end = payload_start + payload_length as usize;
        if payload_end > buffer.len() {
            return Err(BufferError::TruncatedChunk {
                offset,
                length: payload_length,
                available: buffer.len().saturating_sub(payload_start),
            });
        }
        if (payload_length as usize) < INNER_HEADER_LEN {
            return Err(BufferError::TruncatedChunk {
                offset,
                length: payload_length,
                available: payload_length as usize,
            });
        }

        let (object_id, time, flags, sub_id) = buffer.with_slice(|bytes| {
            let inner = &bytes[payload_start..payload_start + INNER_HEADER_LEN];
            let object_id = u32::from_le_bytes([inner[0], inner[1], inner[2], inner[3]]);
            let time = i64::from_le_bytes([
                inner[4], inner[5], inner[6], inner[7], inner[8], inner[9], inner[10], inner[11],
            ]);
            let flags = u16::from_le_bytes([inner[12], inner[13]]);
            let sub_id = u16::from_le_bytes([inner[14], inner[15]]);
            (object_id, time, flags, sub_id)
        });

        Ok(Chunk {
            buffer: buffer.clone(),
            header_offset: offset,
            object_id,
            time,
            flags: ChunkFlags::from_bits(flags),
            sub_id,
            payload_length,
            media_offset: payload_start + INNER_HEADER_LEN,
            media_len: payload_length as usize - INNER_HEADER_LEN,
        })
    }

    /// The buffer this chunk is a view over.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Byte offset, within the owning buffer, where this chunk's header starts.
    pub fn header_offset(&self) -> usize {
        self.header_offset
    }

    /// Identifier of the action/object this chunk's payload belongs to.
    pub fn object_id(&self) -> u32 {
        self.object_id
    }

    /// Sub-channel id, used together with `object_id` for subscriber matching.
    pub fn sub_id(&self) -> u16 {
        self.sub_id
    }

    /// Presentation timestamp carried in the chunk header.
    pub fn time(&self) -> i64 {
        self.time
    }

    /// Flag bits attached to this chunk.
    pub fn flags(&self) -> ChunkFlags {
        self.flags
    }

    /// Length in bytes of the chunk's media payload, excluding the inner header.
    pub fn media_len(&self) -> usize {
        self.media_len
    }

    /// Total framed size of this chunk (header + payload + padding).
    pub fn framed_len(&self) -> usize {
        Self::size_from_header(self.payload_length)
    }

    /// Byte offset, within the owning buffer, where the next chunk begins.
    pub fn next_offset(&self) -> usize {
        self.header_offset + self.framed_len()
    }

    /// Invokes `f` with the chunk's media payload bytes.
    pub fn with_media<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let start = self.media_offset;
        let end = start + self.media_len;
        self.buffer.with_slice(|bytes| f(&bytes[start..end]))
    }

    /// Copies the media payload out into an owned `Vec<u8>`.
    pub fn media_to_vec(&self) -> Vec<u8> {
        self.with_media(|bytes| bytes.to_vec())
    }
}

/// Merges the media payloads of a sequence of `SPLIT`-flagged chunks into a
/// single owned buffer whose lifetime is independent of the originals.
///
/// A split reconstitution always produces a fresh `Buffer`, never an alias
/// chain back through its parts.
pub fn merge_split_chunks(parts: &[Chunk]) -> BufferResult<Buffer> {
    let total: usize = parts.iter().map(|c| c.media_len()).sum();
    let mut merged = Vec::with_capacity(total);
    for part in parts {
        part.with_media(|bytes| merged.extend_from_slice(bytes));
    }
    Ok(Buffer::from_owned(merged))
}

/// Appends a new `MxCh` chunk (header + inner fields + media) to the end of
/// `buffer`'s backing storage, returning the offset at which the chunk was written.
pub fn append_chunk(
    buffer: &Buffer,
    object_id: u32,
    time: i64,
    sub_id: u16,
    flags: ChunkFlags,
    media: &[u8],
) -> BufferResult<usize> {
    let payload_length = INNER_HEADER_LEN + media.len();
    if payload_length > u32::MAX as usize {
        return Err(BufferError::CapacityExceeded {
            additional: media.len(),
            capacity: u32::MAX as usize,
        });
    }
    let payload_length = payload_length as u32;
    let mut framed = Vec::with_capacity(Chunk::size_from_header(payload_length));
    framed.extend_from_slice(MAGIC);
    framed.extend_from_slice(&payload_length.to_le_bytes());
    framed.extend_from_slice(&object_id.to_le_bytes());
    framed.extend_from_slice(&time.to_le_bytes());
    framed.extend_from_slice(&flags.bits().to_le_bytes());
    framed.extend_from_slice(&sub_id.to_le_bytes());
    framed.extend_from_slice(media);
    if payload_length & 1 == 1 {
        framed.push(0);
    }
    buffer.append(&framed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_buffer() -> Buffer {
        let buf = Buffer::from_owned(Vec::new());
        append_chunk(&buf, 1, 100, 0, ChunkFlags::default(), b"hello").unwrap();
        append_chunk(
            &buf,
            2,
            200,
            1,
            ChunkFlags::END_OF_STREAM,
            b"a payload of odd length",
        )
        .unwrap();
        buf
    }

    #[test]
    fn size_from_header_pads_to_even() {
        assert_eq!(Chunk::size_from_header(5), 8 + 5 + 1);
        assert_eq!(Chunk::size_from_header(4), 8 + 4);
    }

    #[test]
    fn parses_sequential_chunks() {
        let buf = sample_buffer();
        let c1 = Chunk::read(&buf, 0).unwrap();
        assert_eq!(c1.object_id(), 1);
        assert_eq!(c1.time(), 100);
        assert_eq!(c1.media_to_vec(), b"hello");

        let c2 = Chunk::read(&buf, c1.next_offset()).unwrap();
        assert_eq!(c2.object_id(), 2);
        assert_eq!(c2.sub_id(), 1);
        assert!(c2.flags().contains(ChunkFlags::END_OF_STREAM));
        assert_eq!(c2.media_to_vec(), b"a payload of odd length");
        assert_eq!(c2.next_offset(), buf.len());
    }

    #[test]
    fn truncated_header_is_reported() {
        let buf = Buffer::from_owned(vec![0u8; 4]);
        let err = Chunk::read(&buf, 0).unwrap_err();
        assert!(matches!(err, BufferError::TruncatedChunk { .. }));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let buf = Buffer::from_owned(Vec::new());
        buf.append(b"XXXX").unwrap();
        buf.append(&8u32.to_le_bytes()).unwrap();
        buf.append(&[0u8; 8]).unwrap();
        let err = Chunk::read(&buf, 0).unwrap_err();
        assert!(matches!(err, BufferError::InvalidMagic { .. }));
    }

    #[test]
    fn merge_split_chunks_is_independent_of_parts() {
        let buf = Buffer::from_owned(Vec::new());
        append_chunk(&buf, 9, 1, 0, ChunkFlags::SPLIT, b"abc").unwrap();
        append_chunk(&buf, 9, 1, 0, ChunkFlags::SPLIT, b"def").unwrap();
        let c1 = Chunk::read(&buf, 0).unwrap();
        let c2 = Chunk::read(&buf, c1.next_offset()).unwrap();
        let merged = merge_split_chunks(&[c1, c2]).unwrap();
        assert_eq!(merged.with_slice(|b| b.to_vec()), b"abcdef");
        assert!(!std::sync::Arc::ptr_eq(&merged.storage_ptr(), &buf.storage_ptr()));
    }
}
