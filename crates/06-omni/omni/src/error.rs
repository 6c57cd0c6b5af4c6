//! Aggregated error type for the coordinator boundary.
//!
//! Every sub-crate's error enum folds into one `OmniError` here via
//! `#[from]`, rather than the coordinator matching on five different error
//! types at every call site.

use thiserror::Error;

/// Convenience alias for coordinator-level results.
pub type OmniResult<T> = Result<T, OmniError>;

/// Errors surfaced at the `Omni` coordinator boundary.
#[derive(Debug, Error)]
pub enum OmniError {
    /// Propagated from a buffer/chunk operation.
    #[error(transparent)]
    Buffer(#[from] omni_buffer::BufferError),
    /// Propagated from container parsing or a provider.
    #[error(transparent)]
    Container(#[from] omni_container::ContainerError),
    /// Propagated from action-tree parsing.
    #[error(transparent)]
    Action(#[from] omni_action::ActionError),
    /// Propagated from the stream controller.
    #[error(transparent)]
    Stream(#[from] omni_stream::StreamError),
    /// `start` was called for an object id already tracked by the coordinator.
    #[error("object {object_id} is already started")]
    AlreadyStarted {
        /// Object id of the action.
        object_id: u32,
    },
    /// `delete_object` was called for an object id the coordinator has no record of.
    #[error("object {object_id} is not started")]
    NotStarted {
        /// Object id of the action.
        object_id: u32,
    },
    /// A source's container held no `MxCh` stream chunks to seek to.
    #[error("source {source_name:?} has no stream chunks")]
    EmptySource {
        /// Name of the source container.
        source_name: String,
    },
}
