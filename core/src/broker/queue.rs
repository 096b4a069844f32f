use crossbeam::queue::SegQueue;
use tokio::sync::Notify;

/// Unbounded multi-producer multi-consumer FIFO.
///
/// `push` never blocks. `pop` suspends until an item is available and is
/// cancel-safe: an item leaves the queue only when `pop` returns it.
#[derive(Debug, Default)]
pub struct Fifo<T> {
    items: SegQueue<T>,
    available: Notify,
}

impl<T> Fifo<T> {
    pub fn new() -> Self {
        Self {
            items: SegQueue::new(),
            available: Notify::new(),
        }
    }

    pub fn push(&self, item: T) {
        self.items.push(item);
        self.available.notify_one();
    }

    pub async fn pop(&self) -> T {
        loop {
            // Register as a waiter before checking so a push in between is not missed
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(item) = self.try_pop() {
                return item;
            }
            notified.await;
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        self.items.pop()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove and return everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<T> {
        std::iter::from_fn(|| self.items.pop()).collect()
    }

    /// Drop queued items that fail `keep`. Returns how many were removed.
    ///
    /// Sweeps the items present when called; kept items go back in their
    /// original order, behind anything pushed during the sweep.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut removed = 0;
        for _ in 0..self.items.len() {
            let Some(item) = self.items.pop() else {
                break;
            };
            if keep(&item) {
                self.push(item);
            } else {
                removed += 1;
            }
        }
        removed
    }
}
