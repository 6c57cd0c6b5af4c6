//! `Omni`: the process-wide coordinator that wires container providers, the
//! stream controller, presenters, the scheduler, and the notification bus
//! into a single entry point for starting, deleting, and querying actions.
//!
//! A fluent builder assembles the pieces, and `tick` drains scheduled work
//! each pass.

use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use omni_action::{Action, ActionBody, ActionKind, CompositeStrategy};
use omni_notify::{
    Listener, ListenerHandle, ListenerId, Notification, NotificationBus, NotificationKind,
    NotificationParam,
};
use omni_presenter::{Presenter, PresenterKind, TickleState};
use omni_scheduler::{Scheduler, TickleClient, TickleHandle, TickleOutcome};
use omni_stream::{StreamController, Subscriber};

use crate::error::{OmniError, OmniResult};
use crate::provider_kind::ProviderKind;
use crate::variable::VariableTable;

/// How often the byte-pump for an open source is driven, in milliseconds.
const CONTROLLER_PUMP_PERIOD_MS: u64 = 10;
/// Chunks pulled from a source's provider per pump tickle.
const CONTROLLER_PUMP_BUDGET: usize = 4;
/// Scheduler period for video presenters: one tickle per monitor refresh.
const VIDEO_PRESENTER_PERIOD_MS: u64 = 33;
/// Scheduler period for every other presenter kind.
const DEFAULT_PRESENTER_PERIOD_MS: u64 = 10;

/// A no-op listener registered at build time, used as the bus-level sender
/// identity for notifications the coordinator itself originates, and as the
/// delivery target for `EndAction`s nobody asked to be told about.
struct DiagnosticListener;

impl Listener for DiagnosticListener {
    fn notify(&mut self, notification: &Notification) {
        let kind = notification.kind;
        let param = &notification.param;
        tracing::debug!(?kind, ?param, "unobserved coordinator notification");
    }
}

fn default_presenter_kind(kind: ActionKind) -> PresenterKind {
    match kind {
        ActionKind::Anim | ActionKind::Object | ActionKind::ObjectAction => PresenterKind::null_animation(),
        ActionKind::Sound => PresenterKind::null_audio(),
        ActionKind::Still | ActionKind::MediaAction => PresenterKind::null_video(0),
        ActionKind::Action | ActionKind::Event => PresenterKind::Control,
        ActionKind::MultiAction
        | ActionKind::SerialAction
        | ActionKind::ParallelAction
        | ActionKind::SelectAction => {
            unreachable!("composite kinds never reach a leaf dispatch")
        }
    }
}

fn period_for(kind: ActionKind) -> u64 {
    match kind {
        ActionKind::Still | ActionKind::MediaAction => VIDEO_PRESENTER_PERIOD_MS,
        _ => DEFAULT_PRESENTER_PERIOD_MS,
    }
}

/// One opened source: the shared controller pumping its bytes, and the
/// scheduler registration keeping that pump alive.
struct SourceState {
    controller: Arc<Mutex<StreamController<ProviderKind>>>,
    _pump_handle: TickleHandle,
}

/// Bookkeeping the coordinator keeps per currently-started leaf object.
struct ObjectEntry {
    _presenter_handle: TickleHandle,
    source_name: String,
}

/// State shared by every open source's scheduler client and every started
/// leaf's presenter client.
struct OmniInner {
    scheduler: Scheduler,
    sources: HashMap<String, SourceState>,
    objects: HashMap<u32, ObjectEntry>,
}

impl OmniInner {
    fn new() -> OmniInner {
        OmniInner {
            scheduler: Scheduler::new(),
            sources: HashMap::new(),
            objects: HashMap::new(),
        }
    }
}

struct OmniShared {
    inner: Mutex<OmniInner>,
    bus: NotificationBus,
    atoms: omni_action::AtomTable,
    variables: VariableTable,
    paused: AtomicBool,
    now_ms: Arc<AtomicI64>,
    default_listener: ListenerHandle,
    presenter_factory: Box<dyn Fn(&Action) -> PresenterKind + Send + Sync>,
}

/// The coordinator: a cheaply-cloneable handle onto the whole running
/// presentation.
#[derive(Clone)]
pub struct Omni {
    shared: Arc<OmniShared>,
}

/// Builds an [`Omni`] via a fluent, chainable configuration API.
pub struct OmniBuilder {
    presenter_factory: Box<dyn Fn(&Action) -> PresenterKind + Send + Sync>,
}

impl OmniBuilder {
    /// Starts a builder with the default presenter-kind mapping (every
    /// presenter headless/null-backed).
    pub fn new() -> OmniBuilder {
        OmniBuilder {
            presenter_factory: Box::new(|action| default_presenter_kind(action.kind)),
        }
    }

    /// Overrides how a presenter's [`PresenterKind`] (and therefore its
    /// sink) is chosen for a starting action, e.g. to wire in real
    /// display/audio backends instead of the null defaults.
    pub fn with_presenter_factory(
        mut self,
        factory: impl Fn(&Action) -> PresenterKind + Send + Sync + 'static,
    ) -> OmniBuilder {
        self.presenter_factory = Box::new(factory);
        self
    }

    /// Assembles the coordinator.
    pub fn build(self) -> Omni {
        let bus = NotificationBus::new();
        let default_listener = bus.register(Box::new(DiagnosticListener));
        Omni {
            shared: Arc::new(OmniShared {
                inner: Mutex::new(OmniInner::new()),
                bus,
                atoms: omni_action::AtomTable::new(),
                variables: VariableTable::new(),
                paused: AtomicBool::new(false),
                now_ms: Arc::new(AtomicI64::new(0)),
                default_listener,
                presenter_factory: self.presenter_factory,
            }),
        }
    }
}

impl Default for OmniBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Omni {
    /// Starts a builder.
    pub fn builder() -> OmniBuilder {
        OmniBuilder::new()
    }

    /// The notification bus backing this coordinator. Callers register their
    /// own listeners directly on it to observe `EndAction` and friends.
    pub fn bus(&self) -> NotificationBus {
        self.shared.bus.clone()
    }

    /// The atom table interning every action's object name as it is parsed.
    pub fn atoms(&self) -> &omni_action::AtomTable {
        &self.shared.atoms
    }

    /// The variable table `SelectAction` predicates read from.
    pub fn variables(&self) -> &VariableTable {
        &self.shared.variables
    }

    /// Starts `action` (and, if composite, its subtree) presenting.
    /// `listener`, if given, receives `EndAction` when the action (or, for a
    /// composite, the whole subtree) finishes.
    pub fn start(&self, action: &Action, listener: Option<ListenerId>) -> OmniResult<()> {
        self.start_node(action, listener, None)
    }

    /// Tears down `action` (and its subtree): unregisters every leaf's
    /// presenter, ends its stream registration, and drops its subscriber.
    pub fn delete_object(&self, action: &Action) -> OmniResult<()> {
        if action.kind.is_composite() {
            for child in action.children() {
                self.delete_object(child)?;
            }
            Ok(())
        } else {
            self.delete_leaf(action.object_id)
        }
    }

    /// Whether `action` (or, for a composite, any descendant) currently has
    /// a live presenter registration.
    pub fn does_entity_exist(&self, action: &Action) -> bool {
        if action.kind.is_composite() {
            action.children().iter().any(|c| self.does_entity_exist(c))
        } else {
            self.shared.inner.lock().objects.contains_key(&action.object_id)
        }
    }

    /// Suspends scheduler draining; `tick` still drains the notification bus.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Relaxed);
    }

    /// Resumes scheduler draining.
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Relaxed);
    }

    /// Whether the coordinator is currently paused.
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Relaxed)
    }

    /// Drives one pass: every scheduler client whose period has elapsed by
    /// `now_ms` is tickled once, then the notification bus is drained.
    ///
    /// The scheduler is briefly taken out of `OmniInner` (enabled by
    /// [`Scheduler`]'s `Default` impl) while its pass runs, so a client's
    /// `tickle` (e.g. a `PresenterClient` whose composite finishes and starts
    /// the next sibling) can freely re-lock `OmniInner` without deadlocking
    /// against this call's own lock.
    pub fn tick(&self, now_ms: i64) {
        self.shared.now_ms.store(now_ms, Ordering::Relaxed);
        if !self.is_paused() {
            let mut scheduler = std::mem::take(&mut self.shared.inner.lock().scheduler);
            scheduler.run_once(now_ms.max(0) as u64);
            self.shared.inner.lock().scheduler = scheduler;
        }
        self.shared.bus.tickle();
    }

    fn start_node(
        &self,
        action: &Action,
        listener: Option<ListenerId>,
        parent: Option<Arc<Mutex<CompositeState>>>,
    ) -> OmniResult<()> {
        if action.kind.is_composite() {
            self.start_composite(action, listener, parent)
        } else {
            self.start_leaf(action, listener, parent)
        }
    }

    fn start_composite(
        &self,
        action: &Action,
        listener: Option<ListenerId>,
        parent: Option<Arc<Mutex<CompositeState>>>,
    ) -> OmniResult<()> {
        let ActionBody::Composite { strategy, children } = &action.body else {
            unreachable!("is_composite implies a Composite body");
        };

        if children.is_empty() {
            let sender = self.shared.default_listener.id();
            let target = listener.unwrap_or(sender);
            self.shared.bus.send(
                sender,
                target,
                NotificationKind::EndAction,
                NotificationParam::ObjectId(action.object_id),
            );
            return Ok(());
        }

        let state = Arc::new(Mutex::new(CompositeState {
            omni_weak: Arc::downgrade(&self.shared),
            bus: self.shared.bus.clone(),
            default_sender: self.shared.default_listener.id(),
            strategy: *strategy,
            children: children.clone(),
            next_index: 0,
            remaining: children.len(),
            parent_object_id: action.object_id,
            parent_listener: listener,
            grandparent: parent,
        }));

        match strategy {
            CompositeStrategy::Serial => self.start_node(&children[0], None, Some(state)),
            CompositeStrategy::Select => {
                let chosen = self.select_child(action, children);
                self.start_node(chosen, None, Some(state))
            }
            CompositeStrategy::Parallel | CompositeStrategy::Multi => {
                for child in children {
                    self.start_node(child, None, Some(Arc::clone(&state)))?;
                }
                Ok(())
            }
        }
    }

    fn select_child<'a>(&self, action: &Action, children: &'a [Action]) -> &'a Action {
        let extra = action.parse_extra();
        if let Some(var_name) = extra.get("select_var") {
            if let Some(value) = self.shared.variables.get(var_name) {
                if let Ok(index) = value.parse::<usize>() {
                    if let Some(child) = children.get(index) {
                        return child;
                    }
                }
                if let Some(child) = children.iter().find(|c| c.object_name == value) {
                    return child;
                }
            }
        }
        &children[0]
    }

    fn start_leaf(
        &self,
        action: &Action,
        listener: Option<ListenerId>,
        parent: Option<Arc<Mutex<CompositeState>>>,
    ) -> OmniResult<()> {
        let mut inner = self.shared.inner.lock();
        if inner.objects.contains_key(&action.object_id) {
            return Err(OmniError::AlreadyStarted {
                object_id: action.object_id,
            });
        }

        let controller = match inner.sources.get(&action.source_name) {
            Some(source) => Arc::clone(&source.controller),
            None => {
                let mut controller = StreamController::new(ProviderKind::for_action(action.flags));
                controller.open(&action.source_name)?;

                let bytes = fs::read(&action.source_name).map_err(|_| {
                    omni_container::ContainerError::CannotOpen {
                        source_name: action.source_name.clone(),
                    }
                })?;
                let index = omni_container::parse_container(&bytes)?;
                let absolute_offset =
                    index
                        .first_stream_chunk_offset()
                        .ok_or_else(|| OmniError::EmptySource {
                            source_name: action.source_name.clone(),
                        })?;
                let relative = absolute_offset as u64 - controller.provider_data_start();
                controller.seek_to(relative)?;

                let controller = Arc::new(Mutex::new(controller));
                let pump = ControllerPumpClient {
                    controller: Arc::clone(&controller),
                    budget: CONTROLLER_PUMP_BUDGET,
                };
                let pump_handle = inner.scheduler.register(
                    Box::new(pump),
                    CONTROLLER_PUMP_PERIOD_MS,
                    self.shared.now_ms.load(Ordering::Relaxed).max(0) as u64,
                );
                inner.sources.insert(
                    action.source_name.clone(),
                    SourceState {
                        controller: Arc::clone(&controller),
                        _pump_handle: pump_handle,
                    },
                );
                controller
            }
        };

        {
            let mut guard = controller.lock();
            guard.start_action(action.clone())?;
            guard.add_subscriber(Subscriber::new(action.object_id, 0));
        }

        let mut presenter = Presenter::new(action.clone(), (self.shared.presenter_factory)(action));
        presenter.start();

        let sender = self.shared.default_listener.id();
        let presenter_client = PresenterClient {
            controller: Arc::clone(&controller),
            presenter,
            bus: self.shared.bus.clone(),
            object_id: action.object_id,
            sub_id: 0,
            now_ms: Arc::clone(&self.shared.now_ms),
            default_sender: sender,
            listener,
            parent,
        };
        let presenter_handle = inner.scheduler.register(
            Box::new(presenter_client),
            period_for(action.kind),
            self.shared.now_ms.load(Ordering::Relaxed).max(0) as u64,
        );
        inner.objects.insert(
            action.object_id,
            ObjectEntry {
                _presenter_handle: presenter_handle,
                source_name: action.source_name.clone(),
            },
        );
        drop(inner);

        self.shared.bus.send(
            sender,
            listener.unwrap_or(sender),
            NotificationKind::StartAction,
            NotificationParam::ObjectId(action.object_id),
        );
        Ok(())
    }

    fn delete_leaf(&self, object_id: u32) -> OmniResult<()> {
        let mut inner = self.shared.inner.lock();
        let entry = inner
            .objects
            .remove(&object_id)
            .ok_or(OmniError::NotStarted { object_id })?;
        if let Some(source) = inner.sources.get(&entry.source_name) {
            let mut guard = source.controller.lock();
            guard.end_action(object_id)?;
            guard.remove_subscriber(object_id, 0);
        }
        Ok(())
    }
}

/// Tracks one composite action's children as they run, firing the parent's
/// `EndAction` (and, if nested, continuing into its own parent) once the
/// strategy's completion condition is met.
struct CompositeState {
    omni_weak: Weak<OmniShared>,
    bus: NotificationBus,
    default_sender: ListenerId,
    strategy: CompositeStrategy,
    children: Vec<Action>,
    next_index: usize,
    remaining: usize,
    parent_object_id: u32,
    parent_listener: Option<ListenerId>,
    grandparent: Option<Arc<Mutex<CompositeState>>>,
}

impl CompositeState {
    fn on_child_done(&mut self, self_arc: &Arc<Mutex<CompositeState>>) {
        match self.strategy {
            CompositeStrategy::Serial => {
                self.next_index += 1;
                if self.next_index < self.children.len() {
                    if let Some(shared) = self.omni_weak.upgrade() {
                        let omni = Omni { shared };
                        let next = self.children[self.next_index].clone();
                        if let Err(err) = omni.start_node(&next, None, Some(Arc::clone(self_arc))) {
                            tracing::warn!(%err, "failed to start next serial child");
                            self.finish();
                        }
                    }
                } else {
                    self.finish();
                }
            }
            CompositeStrategy::Parallel | CompositeStrategy::Multi => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.finish();
                }
            }
            CompositeStrategy::Select => self.finish(),
        }
    }

    fn finish(&mut self) {
        let target = self.parent_listener.unwrap_or(self.default_sender);
        self.bus.send(
            self.default_sender,
            target,
            NotificationKind::EndAction,
            NotificationParam::ObjectId(self.parent_object_id),
        );
        if let Some(grandparent) = self.grandparent.clone() {
            grandparent.lock().on_child_done(&grandparent);
        }
    }
}

/// Pumps one open source's bytes into its subscribers each period, shared by
/// every action currently streaming from that source.
struct ControllerPumpClient {
    controller: Arc<Mutex<StreamController<ProviderKind>>>,
    budget: usize,
}

impl TickleClient for ControllerPumpClient {
    fn tickle(&mut self) -> TickleOutcome {
        match self.controller.lock().tickle(self.budget) {
            Ok(_) => TickleOutcome::Continue,
            Err(err) => {
                tracing::warn!(%err, "stream controller pump failed, unregistering");
                TickleOutcome::Unregister
            }
        }
    }
}

/// Drives one leaf presenter each period: pops its next due chunk, advances
/// its state machine, honors rewind requests, and reports completion.
struct PresenterClient {
    controller: Arc<Mutex<StreamController<ProviderKind>>>,
    presenter: Presenter,
    bus: NotificationBus,
    object_id: u32,
    sub_id: u16,
    now_ms: Arc<AtomicI64>,
    default_sender: ListenerId,
    listener: Option<ListenerId>,
    parent: Option<Arc<Mutex<CompositeState>>>,
}

impl TickleClient for PresenterClient {
    fn tickle(&mut self) -> TickleOutcome {
        let chunk = self.controller.lock().pop_chunk(self.object_id, self.sub_id);
        let now = self.now_ms.load(Ordering::Relaxed);
        let state = self.presenter.tickle(chunk.as_ref(), now);

        if self.presenter.take_rewind_request() {
            let _ = self.controller.lock().rewind(self.object_id);
        }

        if state == TickleState::Done {
            if let Some(target) = self.listener {
                self.bus.send(
                    self.default_sender,
                    target,
                    NotificationKind::EndAction,
                    NotificationParam::ObjectId(self.object_id),
                );
            }
            if let Some(parent) = self.parent.clone() {
                parent.lock().on_child_done(&parent);
            }
            return TickleOutcome::Unregister;
        }
        TickleOutcome::Continue
    }
}
