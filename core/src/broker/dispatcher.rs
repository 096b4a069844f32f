use super::client::Client;
use super::context::BrokerContext;
use super::delivery::deliver;
use crate::protocol::Message;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Pairs queued messages with ready consumers.
///
/// Each pair gets its own delivery task; the dispatcher never waits for one
/// to finish. Spawned tasks are recorded in the shared [`TaskTracker`] so the
/// server can report or await them at shutdown.
pub struct Dispatcher {
    ctx: Arc<BrokerContext>,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(ctx: Arc<BrokerContext>, tracker: TaskTracker) -> Self {
        Self { ctx, tracker }
    }

    /// Dispatch until a shutdown signal arrives.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                (message, client) = self.next_pair() => {
                    self.launch(message, client);
                }
                _ = shutdown_rx.recv() => {
                    info!("Dispatcher stopping");
                    break;
                }
            }
        }
    }

    /// Wait for the next message and the next connected consumer.
    ///
    /// Consumers that disconnected while queued are discarded.
    pub async fn next_pair(&self) -> (Message, Arc<Client>) {
        let message = self.ctx.ingress.pop().await;
        let client = self.next_connected_client().await;
        (message, client)
    }

    async fn next_connected_client(&self) -> Arc<Client> {
        loop {
            let client = self.ctx.ready_consumers.pop().await;
            if client.is_connected() {
                return client;
            }
            debug!("Skipping disconnected User({})", client.address());
        }
    }

    fn launch(&self, message: Message, client: Arc<Client>) {
        debug!(
            "Dispatching '{}' (retries {}) to User({})",
            message.payload_lossy(),
            message.retries,
            client.address()
        );
        let ctx = Arc::clone(&self.ctx);
        self.tracker.spawn(async move {
            deliver(ctx, client, message).await;
        });
    }
}
