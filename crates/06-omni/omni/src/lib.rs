//! The Omni coordinator: wires container streaming, action dispatch, the
//! tickle scheduler, and the notification bus into the single entry point
//! an application drives with `start`/`tick`.

mod coordinator;
mod error;
mod provider_kind;
mod variable;

pub use coordinator::{Omni, OmniBuilder};
pub use error::{OmniError, OmniResult};
pub use provider_kind::ProviderKind;
pub use variable::VariableTable;

pub use omni_action::{
    parse_action, Action, ActionBody, ActionFlags, ActionKind, ActionVendorState,
    AtomTable, CompositeStrategy, LookupMode, Vec3,
};
pub use omni_notify::{
    Listener, ListenerHandle, ListenerId, Notification, NotificationBus, NotificationKind,
    NotificationParam,
};
pub use omni_presenter::{
    AudioSink, DisplaySink, NullAudioSink, NullDisplaySink, NullSceneGraphSink, Presenter,
    PresenterKind, SceneGraphSink, TickleState,
};
