//! Fixture builders for synthetic `.omni` container bytes, shared by the
//! `omni` crate's integration tests and `omni-tests`.
//!
//! Mirrors the byte-construction helpers already duplicated across
//! `omni-container`'s and `omni-buffer`'s own `#[cfg(test)]` modules
//! (`riff.rs`'s `sample_container`, `chunk.rs`'s `append_chunk`), generalized
//! into a single reusable builder so higher-level crates don't re-derive the
//! wire format by hand.

use omni_action::ActionFlags;
use omni_buffer::{append_chunk, Buffer, ChunkFlags};

fn write_u16_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Numeric tag `parse_action` expects for each [`omni_action::ActionKind`].
pub fn tag_for(kind: omni_action::ActionKind) -> u32 {
    use omni_action::ActionKind::*;
    match kind {
        Object => 0,
        Action => 1,
        MediaAction => 2,
        Anim => 3,
        Sound => 4,
        MultiAction => 5,
        SerialAction => 6,
        ParallelAction => 7,
        Event => 8,
        SelectAction => 9,
        Still => 10,
        ObjectAction => 11,
    }
}

/// Serializes a leaf action's `MxOb` payload (no children), in the wire shape
/// `omni_action::parse_action` expects.
#[allow(clippy::too_many_arguments)]
pub fn leaf_action_bytes(
    kind: omni_action::ActionKind,
    source_name: &str,
    object_name: &str,
    object_id: u32,
    flags: ActionFlags,
    loop_count: i32,
    extra_data: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&tag_for(kind).to_le_bytes());
    write_u16_string(&mut out, source_name);
    write_u16_string(&mut out, object_name);
    out.extend_from_slice(&object_id.to_le_bytes());
    out.extend_from_slice(&flags.bits().to_le_bytes());
    out.extend_from_slice(&0i64.to_le_bytes()); // start_time
    out.extend_from_slice(&1000i64.to_le_bytes()); // duration
    out.extend_from_slice(&loop_count.to_le_bytes());
    for _ in 0..9 {
        out.extend_from_slice(&0f32.to_le_bytes()); // location/direction/up
    }
    out.extend_from_slice(&0i32.to_le_bytes()); // unknown24
    out.extend_from_slice(&0i32.to_le_bytes()); // unknown38
    out.extend_from_slice(&(extra_data.len() as u32).to_le_bytes());
    out.extend_from_slice(extra_data);
    out
}

/// Serializes a composite action wrapping `children`'s already-serialized
/// payloads, in file order, under `strategy`.
pub fn composite_action_bytes(
    strategy: omni_action::CompositeStrategy,
    source_name: &str,
    object_name: &str,
    object_id: u32,
    flags: ActionFlags,
    children: &[Vec<u8>],
) -> Vec<u8> {
    use omni_action::CompositeStrategy::*;
    let kind = match strategy {
        Serial => omni_action::ActionKind::SerialAction,
        Parallel => omni_action::ActionKind::ParallelAction,
        Select => omni_action::ActionKind::SelectAction,
        Multi => omni_action::ActionKind::MultiAction,
    };
    let mut out = leaf_action_bytes(kind, source_name, object_name, object_id, flags, 0, b"");
    out.extend_from_slice(&(children.len() as u32).to_le_bytes());
    for child in children {
        out.extend_from_slice(child);
    }
    out
}

fn push_riff_chunk(out: &mut Vec<u8>, id: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(id);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}

/// One stream chunk to embed in a built container's `MxDa` body.
pub struct ChunkFixture {
    pub object_id: u32,
    pub time: i64,
    pub sub_id: u16,
    pub flags: ChunkFlags,
    pub media: Vec<u8>,
}

impl ChunkFixture {
    pub fn new(object_id: u32, time: i64, media: impl Into<Vec<u8>>) -> ChunkFixture {
        ChunkFixture {
            object_id,
            time,
            sub_id: 0,
            flags: ChunkFlags::default(),
            media: media.into(),
        }
    }

    pub fn with_sub_id(mut self, sub_id: u16) -> ChunkFixture {
        self.sub_id = sub_id;
        self
    }

    pub fn with_flags(mut self, flags: ChunkFlags) -> ChunkFixture {
        self.flags = flags;
        self
    }
}

/// An entry in a built container's `MxDa` body, in file order.
pub enum DirItem {
    /// An already-serialized `MxOb` payload, e.g. from [`leaf_action_bytes`]
    /// or [`composite_action_bytes`].
    Object(Vec<u8>),
    /// A stream chunk, framed as `MxCh`.
    Chunk(ChunkFixture),
}

/// Assembles a complete `RIFF`/`OMNI` container from an `MxHd` header and an
/// ordered list of `MxOb`/`MxCh` entries, matching the wire shape
/// `omni_container::parse_container` expects.
pub fn build_container(buffer_size: u32, stream_buffer_count: u32, items: Vec<DirItem>) -> Vec<u8> {
    let mut mxda_body = Vec::new();
    mxda_body.extend_from_slice(b"MxDa");
    for item in items {
        match item {
            DirItem::Object(payload) => push_riff_chunk(&mut mxda_body, b"MxOb", &payload),
            DirItem::Chunk(fixture) => {
                // `omni_buffer::Chunk`'s on-wire framing is bit-identical to a
                // generic RIFF chunk (4-byte id + u32 len), so the real
                // append path doubles as the fixture builder.
                let buffer = Buffer::from_owned(Vec::new());
                append_chunk(
                    &buffer,
                    fixture.object_id,
                    fixture.time,
                    fixture.sub_id,
                    fixture.flags,
                    &fixture.media,
                )
                .expect("fixture media fits in a u32 payload length");
                buffer.with_slice(|bytes| mxda_body.extend_from_slice(bytes));
            }
        }
    }

    let mut list = Vec::new();
    list.extend_from_slice(b"LIST");
    list.extend_from_slice(&(mxda_body.len() as u32).to_le_bytes());
    list.extend_from_slice(&mxda_body);

    let mut mxhd_payload = Vec::new();
    mxhd_payload.extend_from_slice(&2u16.to_le_bytes());
    mxhd_payload.extend_from_slice(&2u16.to_le_bytes());
    mxhd_payload.extend_from_slice(&buffer_size.to_le_bytes());
    mxhd_payload.extend_from_slice(&stream_buffer_count.to_le_bytes());
    let mut mxhd = Vec::new();
    push_riff_chunk(&mut mxhd, b"MxHd", &mxhd_payload);

    let mut content = Vec::new();
    content.extend_from_slice(b"OMNI");
    content.extend_from_slice(&mxhd);
    content.extend_from_slice(&list);

    let mut riff = Vec::new();
    riff.extend_from_slice(b"RIFF");
    riff.extend_from_slice(&(content.len() as u32).to_le_bytes());
    riff.extend_from_slice(&content);
    riff
}

/// Writes `bytes` to a fresh file under the system temp directory, returning
/// its path. Used by tests that need a real path for `omni_container::open`
/// or `omnictl`'s disk-provider path rather than an in-memory buffer.
pub fn write_temp_container(name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "{name}-{}-{}.omni",
        std::process::id(),
        bytes.len()
    ));
    std::fs::write(&path, bytes).expect("failed to write temp container fixture");
    path
}

/// Builds a container file holding only the given stream chunks (no `MxOb`
/// entries), for tests that construct their [`omni_action::Action`] directly
/// in Rust rather than round-tripping it through bytes.
pub fn chunks_only_container(buffer_size: u32, stream_buffer_count: u32, chunks: Vec<ChunkFixture>) -> Vec<u8> {
    build_container(
        buffer_size,
        stream_buffer_count,
        chunks.into_iter().map(DirItem::Chunk).collect(),
    )
}

/// Builds an `Action` struct directly, the way `presenter.rs`'s and
/// `controller.rs`'s own `#[cfg(test)]` modules each do by hand, generalized
/// here so higher-level integration tests don't duplicate the literal.
#[allow(clippy::too_many_arguments)]
pub fn sample_leaf_action(
    kind: omni_action::ActionKind,
    source_name: impl Into<String>,
    object_name: impl Into<String>,
    object_id: u32,
    flags: ActionFlags,
    duration: i64,
    loop_count: i32,
) -> omni_action::Action {
    omni_action::Action {
        kind,
        source_name: source_name.into(),
        object_name: object_name.into(),
        object_id,
        atom: None,
        flags,
        start_time: 0,
        duration,
        loop_count,
        location: omni_action::Vec3::default(),
        direction: omni_action::Vec3::default(),
        up: omni_action::Vec3::default(),
        size_on_disk: 0,
        vendor: omni_action::ActionVendorState::default(),
        extra_data: Vec::new(),
        body: omni_action::ActionBody::Leaf,
    }
}

/// Builds a composite `Action` directly, wrapping `children` under `strategy`.
pub fn sample_composite_action(
    strategy: omni_action::CompositeStrategy,
    object_name: impl Into<String>,
    object_id: u32,
    children: Vec<omni_action::Action>,
) -> omni_action::Action {
    omni_action::Action {
        kind: match strategy {
            omni_action::CompositeStrategy::Serial => omni_action::ActionKind::SerialAction,
            omni_action::CompositeStrategy::Parallel => omni_action::ActionKind::ParallelAction,
            omni_action::CompositeStrategy::Select => omni_action::ActionKind::SelectAction,
            omni_action::CompositeStrategy::Multi => omni_action::ActionKind::MultiAction,
        },
        source_name: String::new(),
        object_name: object_name.into(),
        object_id,
        atom: None,
        flags: ActionFlags::ENABLED,
        start_time: 0,
        duration: 0,
        loop_count: 0,
        location: omni_action::Vec3::default(),
        direction: omni_action::Vec3::default(),
        up: omni_action::Vec3::default(),
        size_on_disk: 0,
        vendor: omni_action::ActionVendorState::default(),
        extra_data: Vec::new(),
        body: omni_action::ActionBody::Composite { strategy, children },
    }
}

/// A single-object, single-chunk container: one leaf action named
/// `object_name` streaming one chunk of `media` at time `0`.
pub fn single_leaf_container(
    kind: omni_action::ActionKind,
    object_name: &str,
    object_id: u32,
    media: impl Into<Vec<u8>>,
) -> Vec<u8> {
    let action = leaf_action_bytes(
        kind,
        "fixture.omni",
        object_name,
        object_id,
        ActionFlags::ENABLED,
        0,
        b"",
    );
    build_container(
        2048,
        10,
        vec![
            DirItem::Object(action),
            DirItem::Chunk(ChunkFixture::new(object_id, 0, media)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_leaf_container_round_trips_through_parse_container() {
        let bytes = single_leaf_container(omni_action::ActionKind::Sound, "blip", 7, b"audio-bytes".to_vec());
        let index = omni_container::parse_container(&bytes).unwrap();
        assert_eq!(index.header.buffer_size, 2048);
        assert_eq!(index.entries.len(), 2);
        assert!(matches!(
            index.entries[0],
            omni_container::DirEntry::Object { .. }
        ));
        assert!(matches!(
            index.entries[1],
            omni_container::DirEntry::StreamChunk { .. }
        ));
    }

    #[test]
    fn single_leaf_container_action_parses_back() {
        let bytes = single_leaf_container(omni_action::ActionKind::Anim, "spin", 3, b"frame-data".to_vec());
        let index = omni_container::parse_container(&bytes).unwrap();
        let omni_container::DirEntry::Object { payload_offset, .. } = index.entries[0] else {
            panic!("expected an object entry first");
        };
        let (action, _) = omni_action::parse_action(&bytes, payload_offset, None).unwrap();
        assert_eq!(action.kind, omni_action::ActionKind::Anim);
        assert_eq!(action.object_name, "spin");
        assert_eq!(action.object_id, 3);
    }

    #[test]
    fn composite_action_bytes_parses_with_children_in_order() {
        let child_a = leaf_action_bytes(
            omni_action::ActionKind::Sound,
            "a.omni",
            "child-a",
            1,
            ActionFlags::ENABLED,
            0,
            b"",
        );
        let child_b = leaf_action_bytes(
            omni_action::ActionKind::Anim,
            "b.omni",
            "child-b",
            2,
            ActionFlags::ENABLED,
            0,
            b"",
        );
        let bytes = composite_action_bytes(
            omni_action::CompositeStrategy::Serial,
            "root.omni",
            "root",
            0,
            ActionFlags::ENABLED,
            &[child_a, child_b],
        );
        let (action, next) = omni_action::parse_action(&bytes, 0, None).unwrap();
        assert_eq!(action.children().len(), 2);
        assert_eq!(action.children()[0].object_name, "child-a");
        assert_eq!(action.children()[1].object_name, "child-b");
        assert_eq!(next, bytes.len());
    }
}
