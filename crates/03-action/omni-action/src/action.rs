//! The deserialized action tree: tagged nodes parsed out of an `MxOb`
//! payload, carried from buffer to controller to presenter.

use smallvec::SmallVec;

use crate::atom::{Atom, AtomTable, LookupMode};
use crate::error::{ActionError, ActionResult};

/// The type tag every action carries, matching the container format's closed
/// set of `MxOb` object types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// A plain scene object with no streamed media of its own.
    Object,
    /// A generic trigger action carrying no media.
    Action,
    /// A media-bearing action whose concrete kind is determined at presentation time.
    MediaAction,
    /// Drives scene-graph keyframes at each tick.
    Anim,
    /// Drives an audio channel.
    Sound,
    /// Unordered grouping with no ordering contract among children.
    MultiAction,
    /// Children run one after another.
    SerialAction,
    /// Children run simultaneously.
    ParallelAction,
    /// Emits a notification when its chunks fire; carries no media output.
    Event,
    /// Exactly one child is chosen by a caller-supplied predicate.
    SelectAction,
    /// A single static image/frame.
    Still,
    /// A world/scene object bound to an action.
    ObjectAction,
}

impl ActionKind {
    fn from_tag(tag: u32) -> ActionResult<ActionKind> {
        Ok(match tag {
            0 => ActionKind::Object,
            1 => ActionKind::Action,
            2 => ActionKind::MediaAction,
            3 => ActionKind::Anim,
            4 => ActionKind::Sound,
            5 => ActionKind::MultiAction,
            6 => ActionKind::SerialAction,
            7 => ActionKind::ParallelAction,
            8 => ActionKind::Event,
            9 => ActionKind::SelectAction,
            10 => ActionKind::Still,
            11 => ActionKind::ObjectAction,
            other => return Err(ActionError::UnknownType { tag: other }),
        })
    }

    /// Whether this kind's body carries an ordered/unordered list of children.
    pub fn is_composite(self) -> bool {
        matches!(
            self,
            ActionKind::MultiAction
                | ActionKind::SerialAction
                | ActionKind::ParallelAction
                | ActionKind::SelectAction
        )
    }
}

/// Flag bits carried in an action's `flags` word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ActionFlags(u32);

impl ActionFlags {
    /// Gates whether the action participates in `tickle` at all.
    pub const ENABLED: ActionFlags = ActionFlags(0x01);
    /// Enables the loop-count rewind path on `EndOfStream`.
    pub const LOOPING: ActionFlags = ActionFlags(0x02);
    /// Domain-specific flag, preserved across clones but not interpreted here.
    pub const WORLD: ActionFlags = ActionFlags(0x04);
    /// Reserved bit, preserved for round-trip fidelity.
    pub const BIT3: ActionFlags = ActionFlags(0x08);

    /// Builds a flag set from a raw bit pattern.
    pub const fn from_bits(bits: u32) -> Self {
        ActionFlags(bits)
    }

    /// Returns the raw bit pattern.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether all bits of `other` are set.
    pub const fn contains(self, other: ActionFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// A three-component vector, used for an action's location/direction/up.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Vec3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

/// Carry-over fields from unexplained `unknown24`/`unknown38` header slots,
/// preserved opaquely rather than invented as meaningful typed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ActionVendorState {
    /// Opaque `unknown24` field.
    pub unknown24: i32,
    /// Opaque `unknown38` field.
    pub unknown38: i32,
}

/// Strategy used by a composite action's children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeStrategy {
    /// Run children one after another; done fires when the last child ends.
    Serial,
    /// Run children simultaneously; done fires when all children end.
    Parallel,
    /// Exactly one child is chosen by a predicate; others are discarded.
    Select,
    /// Unordered composition with no ordering contract.
    Multi,
}

/// Body of an action: either a leaf with no children, or a composite
/// carrying an ordered child list and the strategy by which they run.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionBody {
    /// No children; behavior is entirely determined by `ActionKind`.
    Leaf,
    /// A composite node with children run per `strategy`.
    Composite {
        /// How the children are sequenced.
        strategy: CompositeStrategy,
        /// Child actions, in file order.
        children: Vec<Action>,
    },
}

/// A single node of the deserialized action tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    /// Closed-set type tag.
    pub kind: ActionKind,
    /// Name of the container/source this action's media streams from.
    pub source_name: String,
    /// Name of the object this action targets.
    pub object_name: String,
    /// Numeric object id, used for subscriber/chunk routing.
    pub object_id: u32,
    /// Interned handle for `object_name`, if an atom table was supplied while parsing.
    pub atom: Option<Atom>,
    /// Flag bits (`Enabled`, `Looping`, `World`, `Bit3`).
    pub flags: ActionFlags,
    /// Presentation start time, in milliseconds.
    pub start_time: i64,
    /// Total duration, in milliseconds.
    pub duration: i64,
    /// Remaining loop count; `0` means infinite.
    pub loop_count: i32,
    /// World-space location.
    pub location: Vec3,
    /// World-space facing direction.
    pub direction: Vec3,
    /// World-space up vector.
    pub up: Vec3,
    /// Size, in bytes, of this node's serialized form (header + children),
    /// allowing sibling sequences to be walked without re-parsing.
    pub size_on_disk: u32,
    /// Opaque carry-over fields from the original header.
    pub vendor: ActionVendorState,
    /// Raw `\r\n`-delimited `key:value` extra data block.
    pub extra_data: Vec<u8>,
    /// The node's children, if any.
    pub body: ActionBody,
}

impl Action {
    /// Parses the `key:value` pairs out of `extra_data`.
    ///
    /// Stored as ASCII text with `\r\n`-separated `key:value` entries.
    pub fn parse_extra(&self) -> std::collections::BTreeMap<String, String> {
        let text = String::from_utf8_lossy(&self.extra_data);
        let mut map = std::collections::BTreeMap::new();
        for line in text.split("\r\n") {
            if line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                map.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        map
    }

    /// Children of a composite action, or an empty slice for a leaf.
    pub fn children(&self) -> &[Action] {
        match &self.body {
            ActionBody::Leaf => &[],
            ActionBody::Composite { children, .. } => children,
        }
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Cursor<'a> {
        Cursor { bytes, pos }
    }

    fn need(&self, n: usize) -> ActionResult<()> {
        if self.pos + n > self.bytes.len() {
            return Err(ActionError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.bytes.len().saturating_sub(self.pos),
            });
        }
        Ok(())
    }

    fn u16(&mut self) -> ActionResult<u16> {
        self.need(2)?;
        let v = u16::from_le_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    fn u32(&mut self) -> ActionResult<u32> {
        self.need(4)?;
        let v = u32::from_le_bytes(self.bytes[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn i32(&mut self) -> ActionResult<i32> {
        Ok(self.u32()? as i32)
    }

    fn i64(&mut self) -> ActionResult<i64> {
        self.need(8)?;
        let v = i64::from_le_bytes(self.bytes[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    fn f32(&mut self) -> ActionResult<f32> {
        self.need(4)?;
        let v = f32::from_le_bytes(self.bytes[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn vec3(&mut self) -> ActionResult<Vec3> {
        Ok(Vec3 {
            x: self.f32()?,
            y: self.f32()?,
            z: self.f32()?,
        })
    }

    fn string(&mut self) -> ActionResult<String> {
        let offset = self.pos;
        let len = self.u16()? as usize;
        self.need(len)?;
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        String::from_utf8(slice.to_vec()).map_err(|_| ActionError::InvalidString { offset, length: len })
    }

    fn bytes_field(&mut self) -> ActionResult<Vec<u8>> {
        let len = self.u32()? as usize;
        self.need(len)?;
        let slice = self.bytes[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(slice)
    }
}

/// Parses a single action node, and its children if composite, starting at
/// `offset` in `bytes`. Returns the node and the offset one past its
/// serialized form.
///
/// When `atoms`/`mode` are supplied, `object_name` is interned into the
/// returned `atom` field; callers that only need structural parsing (e.g.
/// tests) may pass `None`.
pub fn parse_action(
    bytes: &[u8],
    offset: usize,
    atoms: Option<(&AtomTable, LookupMode)>,
) -> ActionResult<(Action, usize)> {
    let start = offset;
    let mut cur = Cursor::new(bytes, offset);

    let tag = cur.u32()?;
    let kind = ActionKind::from_tag(tag)?;
    let source_name = cur.string()?;
    let object_name = cur.string()?;
    let object_id = cur.u32()?;
    let flags = ActionFlags::from_bits(cur.u32()?);
    let start_time = cur.i64()?;
    let duration = cur.i64()?;
    let loop_count = cur.i32()?;
    let location = cur.vec3()?;
    let direction = cur.vec3()?;
    let up = cur.vec3()?;
    let vendor = ActionVendorState {
        unknown24: cur.i32()?,
        unknown38: cur.i32()?,
    };
    let extra_data = cur.bytes_field()?;

    let body = if kind.is_composite() {
        let strategy = match kind {
            ActionKind::SerialAction => CompositeStrategy::Serial,
            ActionKind::ParallelAction => CompositeStrategy::Parallel,
            ActionKind::SelectAction => CompositeStrategy::Select,
            ActionKind::MultiAction => CompositeStrategy::Multi,
            _ => unreachable!("is_composite only returns true for the four composite kinds"),
        };
        let declared = cur.u32()?;
        let mut children: SmallVec<[Action; 4]> = SmallVec::new();
        for _ in 0..declared {
            let (child, next) = parse_action(bytes, cur.pos, atoms)?;
            cur.pos = next;
            children.push(child);
        }
        if children.len() as u32 != declared {
            return Err(ActionError::ChildCountMismatch {
                offset: start,
                declared,
                parsed: children.len() as u32,
            });
        }
        ActionBody::Composite {
            strategy,
            children: children.into_vec(),
        }
    } else {
        ActionBody::Leaf
    };

    let size_on_disk = (cur.pos - start) as u32;
    let atom = atoms.map(|(table, mode)| table.intern(&object_name, mode));

    Ok((
        Action {
            kind,
            source_name,
            object_name,
            object_id,
            atom,
            flags,
            start_time,
            duration,
            loop_count,
            location,
            direction,
            up,
            size_on_disk,
            vendor,
            extra_data,
            body,
        },
        cur.pos,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_leaf(out: &mut Vec<u8>, tag: u32, source: &str, name: &str) {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&(source.len() as u16).to_le_bytes());
        out.extend_from_slice(source.as_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&42u32.to_le_bytes()); // object_id
        out.extend_from_slice(&ActionFlags::ENABLED.bits().to_le_bytes());
        out.extend_from_slice(&0i64.to_le_bytes()); // start_time
        out.extend_from_slice(&1000i64.to_le_bytes()); // duration
        out.extend_from_slice(&0i32.to_le_bytes()); // loop_count
        for _ in 0..9 {
            out.extend_from_slice(&0f32.to_le_bytes()); // location/direction/up
        }
        out.extend_from_slice(&0i32.to_le_bytes()); // unknown24
        out.extend_from_slice(&0i32.to_le_bytes()); // unknown38
        out.extend_from_slice(&0u32.to_le_bytes()); // extra_data len
    }

    #[test]
    fn parses_leaf_action() {
        let mut bytes = Vec::new();
        write_leaf(&mut bytes, 3, "movie.omni", "intro-anim");
        let (action, next) = parse_action(&bytes, 0, None).unwrap();
        assert_eq!(action.kind, ActionKind::Anim);
        assert_eq!(action.source_name, "movie.omni");
        assert_eq!(action.object_name, "intro-anim");
        assert_eq!(action.object_id, 42);
        assert!(action.flags.contains(ActionFlags::ENABLED));
        assert_eq!(action.children().len(), 0);
        assert_eq!(next, bytes.len());
        assert_eq!(action.size_on_disk as usize, bytes.len());
    }

    #[test]
    fn parses_serial_composite_with_children() {
        let mut child_a = Vec::new();
        write_leaf(&mut child_a, 4, "a.omni", "child-a");
        let mut child_b = Vec::new();
        write_leaf(&mut child_b, 4, "b.omni", "child-b");

        let mut bytes = Vec::new();
        write_leaf(&mut bytes, 6, "root.omni", "root"); // tag 6 = SerialAction
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&child_a);
        bytes.extend_from_slice(&child_b);

        let (action, next) = parse_action(&bytes, 0, None).unwrap();
        assert_eq!(action.kind, ActionKind::SerialAction);
        assert_eq!(action.children().len(), 2);
        assert_eq!(action.children()[0].object_name, "child-a");
        assert_eq!(action.children()[1].object_name, "child-b");
        assert_eq!(next, bytes.len());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut bytes = Vec::new();
        write_leaf(&mut bytes, 99, "x", "y");
        let err = parse_action(&bytes, 0, None).unwrap_err();
        assert!(matches!(err, ActionError::UnknownType { tag: 99 }));
    }

    #[test]
    fn extra_data_parses_key_value_pairs() {
        let mut bytes = Vec::new();
        write_leaf(&mut bytes, 0, "x", "y");
        // overwrite the trailing extra_data length+bytes we just wrote with real content
        bytes.truncate(bytes.len() - 4);
        let extra = b"speed:3\r\ncolor:red\r\n";
        bytes.extend_from_slice(&(extra.len() as u32).to_le_bytes());
        bytes.extend_from_slice(extra);

        let (action, _) = parse_action(&bytes, 0, None).unwrap();
        let map = action.parse_extra();
        assert_eq!(map.get("speed").map(String::as_str), Some("3"));
        assert_eq!(map.get("color").map(String::as_str), Some("red"));
    }

    #[test]
    fn interns_object_name_when_atom_table_supplied() {
        let table = AtomTable::new();
        let mut bytes = Vec::new();
        write_leaf(&mut bytes, 0, "x", "my-object");
        let (action, _) = parse_action(&bytes, 0, Some((&table, LookupMode::Exact))).unwrap();
        let atom = action.atom.expect("atom table was supplied");
        assert_eq!(table.resolve(atom).unwrap(), "my-object");
    }
}
