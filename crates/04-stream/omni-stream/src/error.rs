//! Errors surfaced by the stream controller and its subscribers.

use thiserror::Error;

/// Failure modes a [`crate::controller::StreamController`] can report.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The provider could not be opened for the given source.
    #[error("cannot open stream source {source_name:?}")]
    CannotOpen {
        /// Name passed to `open`.
        source_name: String,
    },
    /// A read from the provider failed mid-tickle.
    #[error("cannot read {requested} bytes at offset {offset}")]
    CannotRead {
        /// Offset the read was attempted at.
        offset: u64,
        /// Bytes requested.
        requested: usize,
    },
    /// `end_action` was called for an action not in `in_progress`.
    #[error("action {object_id} is not in progress")]
    NotRegistered {
        /// Object id of the action.
        object_id: u32,
    },
    /// `start_action` was called for an action already in `in_progress`.
    #[error("action {object_id} is already in progress")]
    AlreadyRegistered {
        /// Object id of the action.
        object_id: u32,
    },
    /// Propagated from the underlying provider or buffer layer.
    #[error(transparent)]
    Container(#[from] omni_container::ContainerError),
    /// Propagated from the underlying buffer layer.
    #[error(transparent)]
    Buffer(#[from] omni_buffer::BufferError),
}

/// Convenience alias for stream-controller results.
pub type StreamResult<T> = Result<T, StreamError>;
