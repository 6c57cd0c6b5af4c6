//! The scheduler's documented escape hatch: a client may ask to be wrapped
//! in a dedicated background thread that blocks on its period instead of
//! riding the cooperative main-loop pass. Off by default; only available
//! behind the `threaded` feature.

use std::time::Duration;

use crossbeam_channel::{bounded, Sender};

use crate::{TickleClient, TickleOutcome};

/// Handle to a client running on its own background thread. Dropping it
/// requests a stop and joins the thread.
pub struct ThreadedHandle {
    stop: Sender<()>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl ThreadedHandle {
    /// Spawns `client` on a dedicated thread, calling `tickle()` once every
    /// `period`. The client must be prepared for its tickle to run
    /// concurrently with the rest of the engine; this mode is never the
    /// default.
    pub fn spawn<C>(mut client: C, period: Duration) -> ThreadedHandle
    where
        C: TickleClient + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let join = std::thread::spawn(move || loop {
            if stop_rx.recv_timeout(period).is_ok() {
                break;
            }
            if client.tickle() == TickleOutcome::Unregister {
                break;
            }
        });
        ThreadedHandle {
            stop: stop_tx,
            join: Some(join),
        }
    }
}

impl Drop for ThreadedHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
