//! Change Coalescing
//!
//! Bounds how often mutations reach the journal and the disk. Every
//! mutation bumps the generation and re-arms a countdown of `window` ticks;
//! the journal fires on the tick where the countdown goes from 1 to 0, so a
//! burst of changes produces one journal entry once things settle. Explicit
//! write requests are served on the next tick regardless of the countdown.

use crate::error::ConfError;
use crate::store::ConfStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// What a tick asks the owner to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub journal: bool,
    pub write: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeCoalescer {
    generation: u32,
    remaining: u32,
    window: u32,
    request_write: bool,
}

impl ChangeCoalescer {
    pub fn new(window: u32) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    pub fn mark_changed(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.remaining = self.window;
    }

    pub fn request_write(&mut self) {
        self.request_write = true;
    }

    /// Takes effect at the next mutation
    pub fn set_window(&mut self, seconds: u32) {
        self.window = seconds;
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn write_requested(&self) -> bool {
        self.request_write
    }

    pub fn tick(&mut self) -> TickOutcome {
        let journal = self.remaining == 1;
        if self.remaining > 0 {
            self.remaining -= 1;
        }
        let write = std::mem::take(&mut self.request_write);
        TickOutcome { journal, write }
    }
}

/// Callback run when a burst of changes has settled
pub trait Journal: Send {
    fn record(&mut self, store: &mut ConfStore) -> Result<(), ConfError>;
}

impl<F> Journal for F
where
    F: FnMut(&mut ConfStore) -> Result<(), ConfError> + Send,
{
    fn record(&mut self, store: &mut ConfStore) -> Result<(), ConfError> {
        self(store)
    }
}

/// Stops a running [`CoalescerTask`]
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Recurring tick driving a shared store
pub struct CoalescerTask {
    handle: JoinHandle<()>,
    cancel: CancelHandle,
}

impl CoalescerTask {
    /// Start ticking `store` every `interval` on the current tokio runtime.
    pub fn spawn<J>(store: Arc<Mutex<ConfStore>>, interval: Duration, journal: J) -> Self
    where
        J: Journal + 'static,
    {
        let (tx, rx) = watch::channel(false);
        let cancel = CancelHandle { tx: Arc::new(tx) };
        let handle = tokio::spawn(run(store, interval, journal, rx));
        Self { handle, cancel }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancel and wait for the loop to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "coalescer task ended abnormally");
        }
    }
}

async fn run<J: Journal>(
    store: Arc<Mutex<ConfStore>>,
    interval: Duration,
    mut journal: J,
    mut cancelled: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_ms = interval.as_millis() as u64, "coalescer started");

    loop {
        tokio::select! {
            changed = cancelled.changed() => {
                if changed.is_err() || *cancelled.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let outcome = store.lock().tick();
        if outcome.journal {
            let mut guard = store.lock();
            if let Err(e) = journal.record(&mut guard) {
                error!(error = %e, "journal callback failed");
            }
        }
        if outcome.write {
            let shared = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || shared.lock().write_file()).await {
                Ok(Ok(bytes)) => debug!(bytes, "configuration written"),
                Ok(Err(e)) => {
                    error!(error = %e, "config write failed");
                    store.lock().request_write();
                }
                Err(e) => {
                    error!(error = %e, "config write task failed");
                    store.lock().request_write();
                }
            }
        }
    }
    info!("coalescer stopped");
}
