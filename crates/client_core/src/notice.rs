use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::watch;

/// How long a transient notice stays visible before clearing itself.
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

/// Single-slot self-clearing UI message.
///
/// At most one message is visible per slot. `set` publishes a message and
/// schedules a clear after the TTL; a superseding `set` restarts the window
/// and the stale clear is suppressed by a generation counter. The scheduled
/// clear task holds only the watch channel, never the owning view-model, so a
/// torn-down page cannot be mutated by a timer that outlives it.
pub struct EphemeralNotice {
    slot: watch::Sender<Option<String>>,
    generation: Arc<AtomicU64>,
    ttl: Duration,
}

impl EphemeralNotice {
    pub fn new() -> Self {
        Self::with_ttl(NOTICE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot,
            generation: Arc::new(AtomicU64::new(0)),
            ttl,
        }
    }

    /// Publishes `message` and schedules the auto-clear. Must run inside a
    /// tokio runtime.
    pub fn set(&self, message: impl Into<String>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.slot.send_replace(Some(message.into()));

        let slot = self.slot.clone();
        let counter = Arc::clone(&self.generation);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if counter.load(Ordering::SeqCst) == generation {
                slot.send_replace(None);
            }
        });
    }

    /// Empties the slot immediately and invalidates any pending clear.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.slot.send_replace(None);
    }

    pub fn current(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    /// Receiver that observes both `set` and the auto-clear, for re-rendering.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.slot.subscribe()
    }
}

impl Default for EphemeralNotice {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/notice_tests.rs"]
mod tests;
