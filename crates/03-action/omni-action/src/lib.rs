//! The action tree (`MxOb` payload decoding) and the atom table used to
//! intern action/object names.

mod action;
mod atom;
mod error;

pub use action::{
    parse_action, Action, ActionBody, ActionFlags, ActionKind, ActionVendorState,
    CompositeStrategy, Vec3,
};
pub use atom::{Atom, AtomTable, LookupMode};
pub use error::{ActionError, ActionResult};
