//! A single-threaded cooperative tickle scheduler.
//!
//! `register` hands back an RAII [`TickleHandle`]: dropping it unregisters
//! the client, so unregistration can never dangle or be forgotten.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

#[cfg(feature = "threaded")]
pub mod threaded;

/// What a client's tickle call asks the scheduler to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickleOutcome {
    /// Keep this client registered.
    Continue,
    /// Drop this client from the scheduler after this pass.
    Unregister,
}

/// Anything the scheduler can drive on a period.
pub trait TickleClient {
    /// Called once this client's deadline has passed.
    fn tickle(&mut self) -> TickleOutcome;
}

struct Registration {
    id: u64,
    period_ms: u64,
    next_deadline: u64,
    client: Box<dyn TickleClient>,
}

struct Shared {
    pending_unregister: Mutex<HashSet<u64>>,
}

/// RAII handle to a scheduler registration. Dropping it unregisters the
/// client; the actual removal happens at the end of the scheduler's current
/// or next pass, matching the documented deferred-unregister-during-iteration
/// semantics.
pub struct TickleHandle {
    id: u64,
    shared: Arc<Shared>,
}

impl Drop for TickleHandle {
    fn drop(&mut self) {
        self.shared.pending_unregister.lock().insert(self.id);
    }
}

/// The cooperative scheduler: a registration-ordered list of clients, each
/// ticked once per pass when its deadline has passed.
pub struct Scheduler {
    shared: Arc<Shared>,
    registrations: Vec<Registration>,
    next_id: u64,
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Scheduler {
        Scheduler {
            shared: Arc::new(Shared {
                pending_unregister: Mutex::new(HashSet::new()),
            }),
            registrations: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers `client` with `period_ms`, with its first deadline at
    /// `now_ms + period_ms`. Returns a handle that unregisters the client on drop.
    pub fn register(
        &mut self,
        client: Box<dyn TickleClient>,
        period_ms: u64,
        now_ms: u64,
    ) -> TickleHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.registrations.push(Registration {
            id,
            period_ms,
            next_deadline: now_ms + period_ms,
            client,
        });
        TickleHandle {
            id,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Explicitly unregisters the client owning `handle`, equivalent to
    /// dropping it but without consuming the handle's ownership here.
    pub fn unregister(&self, handle: &TickleHandle) {
        self.shared.pending_unregister.lock().insert(handle.id);
    }

    /// Number of clients currently registered (including any pending removal).
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether no clients are registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Runs one scheduler pass at `now_ms`: every client whose deadline has
    /// passed is tickled once, in registration order, with its deadline
    /// advanced by one period (catch-up across passes rather than within
    /// one, per the documented cooperative model). Clients that asked to
    /// unregister, or whose handle was dropped before or during this pass,
    /// are removed once the pass completes.
    pub fn run_once(&mut self, now_ms: u64) {
        for reg in &mut self.registrations {
            if now_ms >= reg.next_deadline {
                let outcome = reg.client.tickle();
                reg.next_deadline += reg.period_ms;
                if outcome == TickleOutcome::Unregister {
                    self.shared.pending_unregister.lock().insert(reg.id);
                }
            }
        }

        let mut pending = self.shared.pending_unregister.lock();
        if !pending.is_empty() {
            self.registrations.retain(|r| !pending.contains(&r.id));
            pending.clear();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
        unregister_after: Option<u32>,
        calls: u32,
    }

    impl TickleClient for Recorder {
        fn tickle(&mut self) -> TickleOutcome {
            self.log.borrow_mut().push(self.name);
            self.calls += 1;
            match self.unregister_after {
                Some(n) if self.calls >= n => TickleOutcome::Unregister,
                _ => TickleOutcome::Continue,
            }
        }
    }

    #[test]
    fn ready_clients_tickle_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        let _a = scheduler.register(
            Box::new(Recorder {
                name: "a",
                log: log.clone(),
                unregister_after: None,
                calls: 0,
            }),
            10,
            0,
        );
        let _b = scheduler.register(
            Box::new(Recorder {
                name: "b",
                log: log.clone(),
                unregister_after: None,
                calls: 0,
            }),
            10,
            0,
        );
        let _c = scheduler.register(
            Box::new(Recorder {
                name: "c",
                log: log.clone(),
                unregister_after: None,
                calls: 0,
            }),
            10,
            0,
        );

        scheduler.run_once(10);
        assert_eq!(&*log.borrow(), &["a", "b", "c"]);
    }

    #[test]
    fn clients_only_tickle_once_their_deadline_passes() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        let _fast = scheduler.register(
            Box::new(Recorder {
                name: "fast",
                log: log.clone(),
                unregister_after: None,
                calls: 0,
            }),
            10,
            0,
        );
        let _slow = scheduler.register(
            Box::new(Recorder {
                name: "slow",
                log: log.clone(),
                unregister_after: None,
                calls: 0,
            }),
            100,
            0,
        );

        scheduler.run_once(10);
        assert_eq!(&*log.borrow(), &["fast"]);
        log.borrow_mut().clear();

        scheduler.run_once(100);
        assert_eq!(&*log.borrow(), &["fast", "slow"]);
    }

    #[test]
    fn dropping_handle_unregisters_by_next_pass() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        let handle = scheduler.register(
            Box::new(Recorder {
                name: "a",
                log: log.clone(),
                unregister_after: None,
                calls: 0,
            }),
            10,
            0,
        );
        drop(handle);
        assert_eq!(scheduler.len(), 1, "removal is deferred to the next pass");
        scheduler.run_once(10);
        assert!(log.borrow().is_empty());
        assert_eq!(scheduler.len(), 0);
    }

    #[test]
    fn client_requested_unregister_removes_after_the_pass() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        let _a = scheduler.register(
            Box::new(Recorder {
                name: "a",
                log: log.clone(),
                unregister_after: Some(1),
                calls: 0,
            }),
            10,
            0,
        );
        scheduler.run_once(10);
        assert_eq!(&*log.borrow(), &["a"]);
        assert_eq!(scheduler.len(), 0);
    }
}
