//! Errors surfaced while parsing an action tree out of buffer bytes.

use thiserror::Error;

/// Convenience result alias for action parsing.
pub type ActionResult<T> = Result<T, ActionError>;

/// Errors raised while decoding an `Action` from its serialized header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    /// The action's `type` tag did not match any recognized variant.
    #[error("unrecognized action type tag {tag}")]
    UnknownType {
        /// The raw tag value encountered.
        tag: u32,
    },
    /// The header ran past the bytes actually available.
    #[error("action header at offset {offset} needs {needed} bytes, {available} available")]
    Truncated {
        /// Offset the header parse started at.
        offset: usize,
        /// Bytes the header declared it needed.
        needed: usize,
        /// Bytes actually available from that offset.
        available: usize,
    },
    /// A string field's declared length overran the buffer.
    #[error("string field at offset {offset} has invalid length {length}")]
    InvalidString {
        /// Offset of the string field.
        offset: usize,
        /// Declared length of the string.
        length: usize,
    },
    /// A composite action declared a child count that didn't fit in the buffer.
    #[error("composite action at offset {offset} declares {declared} children but only {parsed} parsed")]
    ChildCountMismatch {
        /// Offset of the composite action header.
        offset: usize,
        /// Number of children the header declared.
        declared: u32,
        /// Number of children actually parsed before running out of bytes.
        parsed: u32,
    },
}
