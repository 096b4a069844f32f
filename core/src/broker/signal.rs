use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// Binary wake-up signal shared by a client's connection handler and the
/// delivery task currently holding that client.
///
/// `set` wakes the listener; `clear` resets the level before the next cycle.
/// A [`ReadyListener`] created before `set` is woken even if `clear` runs
/// before it is polled, so a confirmation followed by an immediate new
/// request cannot strand the previous delivery.
#[derive(Debug, Default)]
pub struct ReadySignal {
    set: AtomicBool,
    notify: Notify,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.set.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn clear(&self) {
        self.set.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::SeqCst)
    }

    /// Start listening for the next `set`.
    pub fn listen(&self) -> ReadyListener<'_> {
        ReadyListener {
            signal: self,
            notified: self.notify.notified(),
        }
    }

    pub async fn wait(&self) {
        self.listen().wait().await
    }
}

pub struct ReadyListener<'a> {
    signal: &'a ReadySignal,
    notified: Notified<'a>,
}

impl ReadyListener<'_> {
    /// Resolve once the signal has been set since this listener was created,
    /// or immediately if it is already set.
    pub async fn wait(self) {
        if self.signal.is_set() {
            return;
        }
        self.notified.await;
    }
}
