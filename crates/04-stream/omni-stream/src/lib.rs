//! Chunk routing between a container provider and the actions currently
//! streaming from it.

mod controller;
mod error;
mod subscriber;

pub use controller::{StreamController, TickleReport};
pub use error::{StreamError, StreamResult};
pub use subscriber::Subscriber;
