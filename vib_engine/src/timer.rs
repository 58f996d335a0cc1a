//! One-shot monotonic deadline sources.
//!
//! A timer holds at most one pending deadline. Arming replaces whatever was
//! pending. On expiry the bound [`ExpiryHandler`] runs in the timer's own
//! context and must only hand work off (it must not block or take the
//! controller lock). Each arming carries an opaque token that is passed
//! back to the handler.
//!
//! - [`ThreadTimer`] - production source on a dedicated thread, `Instant` based
//! - [`ManualTimer`] - virtual clock advanced explicitly, for deterministic tests

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vib_common::error::{VibError, VibResult};

/// Callback invoked on expiry with the token given to [`OneShotTimer::start`].
///
/// Expiry never re-arms the timer; the owner arms again if it wants another deadline.
pub type ExpiryHandler = Arc<dyn Fn(u64) + Send + Sync>;

/// Cancellable one-shot deadline source.
pub trait OneShotTimer: Send + Sync {
    /// Install the expiry handler. Called once, before the first `start`.
    fn bind(&self, handler: ExpiryHandler) -> VibResult<()>;

    /// Arm for `after` from now, replacing any pending deadline.
    fn start(&self, after: Duration, token: u64);

    /// Disarm. Returns `true` if a deadline was pending.
    ///
    /// If the handler is running concurrently, waits for it to return.
    fn cancel(&self) -> bool;

    /// Time left until the pending deadline, `None` when idle.
    fn remaining(&self) -> Option<Duration>;
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    deadline: Instant,
    token: u64,
}

#[derive(Default)]
struct ThreadTimerState {
    armed: Option<Armed>,
    handler: Option<ExpiryHandler>,
    firing: bool,
    shutdown: bool,
}

#[derive(Default)]
struct ThreadTimerShared {
    state: Mutex<ThreadTimerState>,
    cond: Condvar,
}

/// Timer backed by a dedicated thread sleeping on a monotonic deadline.
pub struct ThreadTimer {
    name: String,
    shared: Arc<ThreadTimerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadTimer {
    /// Create an unbound timer. The thread starts on [`OneShotTimer::bind`].
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shared: Arc::new(ThreadTimerShared::default()),
            thread: Mutex::new(None),
        }
    }

    fn run(shared: &ThreadTimerShared) {
        let mut st = shared.state.lock();
        loop {
            if st.shutdown {
                break;
            }
            let Some(armed) = st.armed else {
                shared.cond.wait(&mut st);
                continue;
            };
            if Instant::now() < armed.deadline {
                shared.cond.wait_until(&mut st, armed.deadline);
                continue;
            }

            st.armed = None;
            let Some(handler) = st.handler.clone() else {
                continue;
            };
            st.firing = true;
            MutexGuard::unlocked(&mut st, || handler(armed.token));
            st.firing = false;
            shared.cond.notify_all();
        }
        debug!("timer thread exiting");
    }
}

impl OneShotTimer for ThreadTimer {
    fn bind(&self, handler: ExpiryHandler) -> VibResult<()> {
        self.shared.state.lock().handler = Some(handler);

        let mut thread = self.thread.lock();
        if thread.is_none() {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(self.name.clone())
                .spawn(move || Self::run(&shared))
                .map_err(|e| VibError::InitFailed(format!("failed to spawn timer: {e}")))?;
            *thread = Some(handle);
        }
        Ok(())
    }

    fn start(&self, after: Duration, token: u64) {
        let mut st = self.shared.state.lock();
        st.armed = Some(Armed {
            deadline: Instant::now() + after,
            token,
        });
        self.shared.cond.notify_all();
    }

    fn cancel(&self) -> bool {
        let mut st = self.shared.state.lock();
        let was_armed = st.armed.take().is_some();
        while st.firing {
            self.shared.cond.wait(&mut st);
        }
        self.shared.cond.notify_all();
        was_armed
    }

    fn remaining(&self) -> Option<Duration> {
        let st = self.shared.state.lock();
        st.armed
            .map(|a| a.deadline.saturating_duration_since(Instant::now()))
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        {
            let mut st = self.shared.state.lock();
            st.shutdown = true;
            st.armed = None;
            self.shared.cond.notify_all();
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                warn!("timer thread panicked");
            }
        }
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    armed: Option<(Duration, u64)>,
    handler: Option<ExpiryHandler>,
}

/// Virtual-clock timer. Time only moves when the owner advances it.
///
/// Clones share the same clock, so a test can keep one handle and give
/// another to the controller.
#[derive(Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<ManualState>>,
}

impl ManualTimer {
    /// Create a timer at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Pending deadline in virtual time.
    pub fn deadline(&self) -> Option<Duration> {
        self.state.lock().armed.map(|(deadline, _)| deadline)
    }

    /// True if a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.state.lock().armed.is_some()
    }

    /// Jump to the pending deadline and fire it.
    ///
    /// Returns the virtual time of the expiry, or `None` if nothing was armed.
    pub fn fire_next(&self) -> Option<Duration> {
        let (deadline, token, handler) = {
            let mut st = self.state.lock();
            let (deadline, token) = st.armed.take()?;
            st.now = st.now.max(deadline);
            (deadline, token, st.handler.clone()?)
        };
        handler(token);
        Some(deadline)
    }

    /// Move the clock forward by `by`. If the pending deadline falls inside
    /// that window the clock stops at the deadline and the timer fires.
    ///
    /// Fires at most once; returns whether it did.
    pub fn advance(&self, by: Duration) -> bool {
        let due = {
            let mut st = self.state.lock();
            let target = st.now + by;
            match st.armed {
                Some((deadline, _)) if deadline <= target => true,
                _ => {
                    st.now = target;
                    false
                }
            }
        };
        due && self.fire_next().is_some()
    }
}

impl OneShotTimer for ManualTimer {
    fn bind(&self, handler: ExpiryHandler) -> VibResult<()> {
        self.state.lock().handler = Some(handler);
        Ok(())
    }

    fn start(&self, after: Duration, token: u64) {
        let mut st = self.state.lock();
        st.armed = Some((st.now + after, token));
    }

    fn cancel(&self) -> bool {
        self.state.lock().armed.take().is_some()
    }

    fn remaining(&self) -> Option<Duration> {
        let st = self.state.lock();
        st.armed
            .map(|(deadline, _)| deadline.saturating_sub(st.now))
    }
}
