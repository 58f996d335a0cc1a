//! Enable/disable notification chain.
//!
//! Subscribers are invoked synchronously, in registration order, on every
//! enable or disable transition. The controller calls [`NotifierChain::notify`]
//! while holding its state lock, so subscribers must not call back into the
//! controller.

use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};
use vib_common::error::{VibError, VibResult};

/// Payload broadcast to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VibEvent {
    /// True on enable, false on disable.
    pub active: bool,
    /// Active on-chip waveform index (0 = none).
    pub index: u32,
    /// Current timeout or step duration, in milliseconds.
    pub timeout_ms: u32,
}

/// Status a subscriber reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyStatus {
    /// Not interested.
    #[default]
    Done,
    /// Handled.
    Ok,
    /// Handled; later subscribers are skipped.
    Stop,
    /// Failed; later subscribers are skipped.
    Bad,
}

impl NotifyStatus {
    /// True if the chain stops after this status.
    #[inline]
    pub const fn halts_chain(self) -> bool {
        matches!(self, Self::Stop | Self::Bad)
    }
}

/// Receiver of [`VibEvent`]s.
pub trait VibSubscriber: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &VibEvent) -> NotifyStatus;
}

impl<F> VibSubscriber for F
where
    F: Fn(&VibEvent) -> NotifyStatus + Send + Sync,
{
    fn on_event(&self, event: &VibEvent) -> NotifyStatus {
        self(event)
    }
}

/// Handle returned by [`NotifierChain::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Ordered subscriber list.
#[derive(Default)]
pub struct NotifierChain {
    subscribers: RwLock<Vec<(SubscriberId, Arc<dyn VibSubscriber>)>>,
    next_id: AtomicU64,
}

impl NotifierChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber.
    pub fn register(&self, subscriber: Arc<dyn VibSubscriber>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, subscriber));
        info!("notifier: registered subscriber {:?}", id);
        id
    }

    /// Remove a subscriber.
    ///
    /// # Errors
    /// `InvalidArgument` if `id` is not registered (including a second
    /// unregister of the same id).
    pub fn unregister(&self, id: SubscriberId) -> VibResult<()> {
        let mut subs = self.subscribers.write();
        let pos = subs.iter().position(|(sid, _)| *sid == id).ok_or_else(|| {
            warn!("notifier: unregister of unknown subscriber {:?}", id);
            VibError::invalid(format!("unknown subscriber {id:?}"))
        })?;
        subs.remove(pos);
        info!("notifier: unregistered subscriber {:?}", id);
        Ok(())
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// True if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Broadcast `event` and return the last status reported.
    pub fn notify(&self, event: &VibEvent) -> NotifyStatus {
        let subs = self.subscribers.read();
        let mut status = NotifyStatus::Done;
        for (_, sub) in subs.iter() {
            status = sub.on_event(event);
            if status.halts_chain() {
                break;
            }
        }

        match status {
            NotifyStatus::Done | NotifyStatus::Ok => info!(
                "notify {} idx: {} timeout: {} done({:?})",
                if event.active { "ON" } else { "OFF" },
                event.index,
                event.timeout_ms,
                status
            ),
            NotifyStatus::Stop | NotifyStatus::Bad => warn!(
                "notify {} idx: {} timeout: {} failed({:?})",
                if event.active { "ON" } else { "OFF" },
                event.index,
                event.timeout_ms,
                status
            ),
        }
        status
    }
}
