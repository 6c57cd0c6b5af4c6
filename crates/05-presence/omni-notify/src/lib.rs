//! The notification bus: a targeted, queued pub/sub channel connecting
//! presenters, stream controllers, and input sources.
//!
//! The live queue and the in-flight drain queue are two
//! `Vec<QueuedNotification>` behind one `parking_lot::Mutex`, swapped at the
//! start of every [`NotificationBus::tickle`] call so notifications queued
//! during delivery land on the next drain instead of starving it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Closed set of notification kinds the core emits and consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// A presenter/action has started.
    StartAction,
    /// A presenter/action has ended.
    EndAction,
    /// Generic presenter-originated event.
    Presenter,
    /// Generic stream-controller-originated event.
    Streamer,
    /// A key was pressed.
    KeyPress,
    /// A mouse button was released.
    ButtonUp,
    /// A mouse button was pressed.
    ButtonDown,
    /// The mouse moved.
    MouseMove,
    /// A click was recognized.
    Click,
    /// A drag gesture started.
    DragStart,
    /// A drag gesture is in progress.
    Drag,
    /// A drag gesture ended.
    DragEnd,
    /// A scheduled timer fired.
    Timer,
    /// A generic control-channel event.
    Control,
    /// An animation reached its end.
    EndAnim,
    /// A path-following structure update.
    PathStruct,
    /// A new presenter was created.
    NewPresenter,
    /// A presenter's state transitioned.
    Transitioned,
}

/// Payload carried alongside a notification's `kind`. Kept as a small closed
/// enum rather than an opaque blob so listeners can match without downcasting.
#[derive(Clone, Debug, PartialEq)]
pub enum NotificationParam {
    /// No payload.
    Empty,
    /// Identifies the object/action a notification concerns.
    ObjectId(u32),
    /// A 2D point, for pointer-driven notifications.
    Point {
        /// X coordinate.
        x: f32,
        /// Y coordinate.
        y: f32,
    },
    /// A key code, for keyboard notifications.
    KeyCode(u32),
    /// Opaque bytes for payload shapes not otherwise enumerated.
    Opaque(Vec<u8>),
}

/// A single queued notification: its kind, payload, and the listener that
/// sent it (so the listener may reuse its own stack frame after `send`
/// returns, per the cloned-on-send contract).
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    /// The notification's closed-set kind.
    pub kind: NotificationKind,
    /// Listener id of whoever called `send`.
    pub sender: ListenerId,
    /// Payload carried with the notification.
    pub param: NotificationParam,
}

/// Anything that can receive notifications from the bus.
pub trait Listener {
    /// Delivers a single notification.
    fn notify(&mut self, notification: &Notification);
}

/// Opaque identity of a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct QueuedNotification {
    target: ListenerId,
    notification: Notification,
}

struct Inner {
    listeners: HashMap<ListenerId, Box<dyn Listener + Send>>,
    next_id: u64,
    live: Vec<QueuedNotification>,
    draining: Vec<QueuedNotification>,
}

struct Shared {
    inner: Mutex<Inner>,
}

/// The notification bus. Cheaply cloneable; clones share the same queue and
/// listener registry.
#[derive(Clone)]
pub struct NotificationBus {
    shared: Arc<Shared>,
}

/// RAII handle to a bus registration. Dropping it unregisters the listener,
/// discarding any notification still queued for it before delivery.
pub struct ListenerHandle {
    id: ListenerId,
    shared: Arc<Shared>,
}

impl ListenerHandle {
    /// The id this handle's listener is addressed by.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shared.inner.lock().listeners.remove(&self.id);
    }
}

impl NotificationBus {
    /// Creates an empty bus.
    pub fn new() -> NotificationBus {
        NotificationBus {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    listeners: HashMap::new(),
                    next_id: 0,
                    live: Vec::new(),
                    draining: Vec::new(),
                }),
            }),
        }
    }

    /// Registers `listener`, returning a handle that unregisters it on drop.
    pub fn register(&self, listener: Box<dyn Listener + Send>) -> ListenerHandle {
        let mut inner = self.shared.inner.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.insert(id, listener);
        ListenerHandle {
            id,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Explicitly unregisters the listener owning `handle`.
    pub fn unregister(&self, handle: &ListenerHandle) {
        self.shared.inner.lock().listeners.remove(&handle.id);
    }

    /// Queues a notification addressed to `target`, sent on behalf of `sender`.
    pub fn send(
        &self,
        sender: ListenerId,
        target: ListenerId,
        kind: NotificationKind,
        param: NotificationParam,
    ) {
        let mut inner = self.shared.inner.lock();
        inner.live.push(QueuedNotification {
            target,
            notification: Notification {
                kind,
                sender,
                param,
            },
        });
    }

    /// Drains the queue built up since the last tickle, delivering each
    /// notification to its target if still registered. Notifications sent
    /// during delivery land in the now-empty live queue and are processed on
    /// the next tickle, preventing reentrant starvation.
    pub fn tickle(&self) {
        let to_process = {
            let mut inner = self.shared.inner.lock();
            std::mem::swap(&mut inner.live, &mut inner.draining);
            std::mem::take(&mut inner.draining)
        };

        for queued in to_process {
            let listener = {
                let mut inner = self.shared.inner.lock();
                inner.listeners.remove(&queued.target)
            };
            if let Some(mut listener) = listener {
                listener.notify(&queued.notification);
                let mut inner = self.shared.inner.lock();
                inner.listeners.entry(queued.target).or_insert(listener);
            }
        }
    }

    /// Number of listeners currently registered.
    pub fn listener_count(&self) -> usize {
        self.shared.inner.lock().listeners.len()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc as StdArc, Mutex as StdMutex};

    struct Recorder(StdArc<StdMutex<Vec<NotificationKind>>>);
    impl Listener for Recorder {
        fn notify(&mut self, notification: &Notification) {
            self.0.lock().unwrap().push(notification.kind);
        }
    }

    #[test]
    fn delivers_in_fifo_order_per_tick() {
        let bus = NotificationBus::new();
        let log = StdArc::new(StdMutex::new(Vec::new()));
        let handle = bus.register(Box::new(Recorder(log.clone())));
        let self_id = handle.id();

        bus.send(self_id, handle.id(), NotificationKind::StartAction, NotificationParam::Empty);
        bus.send(self_id, handle.id(), NotificationKind::EndAction, NotificationParam::Empty);
        bus.tickle();

        assert_eq!(
            &*log.lock().unwrap(),
            &[NotificationKind::StartAction, NotificationKind::EndAction]
        );
    }

    #[test]
    fn notifications_sent_during_delivery_wait_for_next_tick() {
        struct Resender {
            bus: NotificationBus,
            self_id: StdArc<StdMutex<Option<ListenerId>>>,
            log: StdArc<StdMutex<Vec<NotificationKind>>>,
        }
        impl Listener for Resender {
            fn notify(&mut self, notification: &Notification) {
                self.log.lock().unwrap().push(notification.kind);
                if notification.kind == NotificationKind::StartAction {
                    let id = self.self_id.lock().unwrap().expect("self_id set right after registration");
                    self.bus.send(id, id, NotificationKind::EndAction, NotificationParam::Empty);
                }
            }
        }

        let bus = NotificationBus::new();
        let log = StdArc::new(StdMutex::new(Vec::new()));
        let self_id_cell = StdArc::new(StdMutex::new(None));
        let handle = bus.register(Box::new(Resender {
            bus: bus.clone(),
            self_id: self_id_cell.clone(),
            log: log.clone(),
        }));
        *self_id_cell.lock().unwrap() = Some(handle.id());

        bus.send(handle.id(), handle.id(), NotificationKind::StartAction, NotificationParam::Empty);
        bus.tickle();
        assert_eq!(&*log.lock().unwrap(), &[NotificationKind::StartAction]);
        log.lock().unwrap().clear();

        bus.tickle();
        assert_eq!(&*log.lock().unwrap(), &[NotificationKind::EndAction]);
        drop(handle);
    }

    #[test]
    fn deregistration_discards_queued_notification() {
        let bus = NotificationBus::new();
        let log = StdArc::new(StdMutex::new(Vec::new()));
        let handle = bus.register(Box::new(Recorder(log.clone())));
        let id = handle.id();
        bus.send(id, id, NotificationKind::Timer, NotificationParam::Empty);
        drop(handle);
        bus.tickle();
        assert!(log.lock().unwrap().is_empty());
    }
}
