//! Presenter core: the seven-state tickle state machine, the media-kind
//! dispatch enum, and the capability traits device/codec backends implement.

mod presenter;
mod sink;
mod state;

pub use presenter::{Presenter, PresenterKind};
pub use sink::{AudioSink, DisplaySink, NullAudioSink, NullDisplaySink, NullSceneGraphSink, SceneGraphSink};
pub use state::{PresenterState, TickleState};
