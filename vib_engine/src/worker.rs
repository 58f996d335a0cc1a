//! Single-slot serialized worker.
//!
//! One background thread runs submitted work items strictly one at a time.
//! The queue has exactly one slot: at most one step advance is ever pending
//! before the next arming, so a deeper queue would only hide bugs. Each
//! item carries the run token it was submitted with.
//!
//! [`WorkSlot::flush`] blocks until nothing is pending or running. That is
//! the drain half of the controller's cancel-then-drain discipline.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, warn};
use vib_common::error::{VibError, VibResult};

#[derive(Debug, Default)]
struct SlotState {
    /// Token of the queued item, if any.
    pending: Option<u64>,
    /// An item is executing right now.
    running: bool,
    /// Worker thread must exit.
    shutdown: bool,
    /// Worker thread id, for flush-from-worker detection.
    worker_thread: Option<ThreadId>,
}

/// Shared single-slot queue between submitters and the worker thread.
#[derive(Debug, Default)]
pub struct WorkSlot {
    state: Mutex<SlotState>,
    cond: Condvar,
}

impl WorkSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit an item.
    ///
    /// Returns `false` if an item was already pending; the pending token is
    /// replaced by the newer one. Never blocks beyond the slot lock, so it
    /// is safe to call from a timer callback.
    pub fn queue(&self, token: u64) -> bool {
        let mut st = self.state.lock();
        if st.shutdown {
            return false;
        }
        let was_empty = st.pending.replace(token).is_none();
        self.cond.notify_all();
        was_empty
    }

    /// Wait until no item is pending or running.
    ///
    /// Called from the worker thread itself this returns immediately,
    /// since waiting on its own item could never finish.
    pub fn flush(&self) {
        let mut st = self.state.lock();
        if st.worker_thread == Some(thread::current().id()) {
            debug!("flush requested from worker thread, skipping");
            return;
        }
        while !st.shutdown && (st.pending.is_some() || st.running) {
            self.cond.wait(&mut st);
        }
    }

    fn next(&self) -> Option<u64> {
        let mut st = self.state.lock();
        loop {
            if st.shutdown {
                return None;
            }
            if let Some(token) = st.pending.take() {
                st.running = true;
                return Some(token);
            }
            self.cond.wait(&mut st);
        }
    }

    fn finish(&self) {
        let mut st = self.state.lock();
        st.running = false;
        self.cond.notify_all();
    }

    fn shutdown(&self) {
        let mut st = self.state.lock();
        st.shutdown = true;
        st.pending = None;
        self.cond.notify_all();
    }
}

/// Dedicated worker thread draining a [`WorkSlot`].
pub struct Worker {
    slot: Arc<WorkSlot>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn the worker thread.
    ///
    /// # Errors
    /// `InitFailed` if the OS refuses the thread.
    pub fn spawn<F>(name: &str, slot: Arc<WorkSlot>, mut handler: F) -> VibResult<Self>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let thread_slot = Arc::clone(&slot);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                thread_slot.state.lock().worker_thread = Some(thread::current().id());
                while let Some(token) = thread_slot.next() {
                    handler(token);
                    thread_slot.finish();
                }
                debug!("worker thread exiting");
            })
            .map_err(|e| VibError::InitFailed(format!("failed to spawn worker: {e}")))?;

        Ok(Self {
            slot,
            handle: Some(handle),
        })
    }

    /// Wait for submitted work to finish. See [`WorkSlot::flush`].
    pub fn flush(&self) {
        self.slot.flush();
    }

    /// Stop the thread after the current item and join it.
    pub fn stop(&mut self) {
        self.slot.shutdown();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
