use super::context::BrokerContext;
use super::dispatcher::Dispatcher;
use super::handler::serve_connection;
use super::queue::Fifo;
use crate::metrics::BrokerMetrics;
use crate::protocol::Message;
use crate::{config::BrokerConfig, Result, SspqError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

pub struct BrokerServer {
    config: BrokerConfig,
    ctx: Arc<BrokerContext>,
    // Delivery tasks spawned by the dispatcher
    deliveries: TaskTracker,
    // Graceful shutdown coordination
    shutdown_tx: broadcast::Sender<()>,
}

impl BrokerServer {
    pub fn new(config: BrokerConfig) -> Result<Self> {
        config.validate().map_err(SspqError::Config)?;

        let ctx = Arc::new(BrokerContext::new(&config));
        let (shutdown_tx, _) = broadcast::channel(16);

        Ok(Self {
            config,
            ctx,
            deliveries: TaskTracker::new(),
            shutdown_tx,
        })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<BrokerContext> {
        &self.ctx
    }

    /// Messages that exhausted their retries, for an external drainer.
    pub fn dead_letters(&self) -> &Fifo<Message> {
        &self.ctx.dead_letters
    }

    pub fn metrics(&self) -> &BrokerMetrics {
        &self.ctx.metrics
    }

    /// Number of delivery tasks that have not resolved yet.
    pub fn in_flight(&self) -> usize {
        self.deliveries.len()
    }

    /// Stop accepting connections and stop the dispatcher.
    ///
    /// Outstanding deliveries keep running until their client confirms or
    /// disconnects.
    pub fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("Serving on {}", local_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let dispatcher = Dispatcher::new(Arc::clone(&self.ctx), self.deliveries.clone());
        let dispatcher_handle = tokio::spawn(dispatcher.run(self.shutdown_tx.subscribe()));

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => self.accept(stream, peer_addr),
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal, no longer accepting connections");
                    break;
                }
            }
        }

        if let Err(e) = dispatcher_handle.await {
            error!("Dispatcher task failed: {}", e);
        }

        self.deliveries.close();
        let outstanding = self.deliveries.len();
        if outstanding > 0 {
            warn!(
                "{} deliveries still awaiting confirmation at shutdown",
                outstanding
            );
        }

        info!("Server shutdown complete");
        Ok(())
    }

    fn accept(&self, stream: TcpStream, peer_addr: SocketAddr) {
        if let Err(e) = Self::configure_client_socket(&stream) {
            warn!("Failed to configure client socket {}: {}", peer_addr, e);
        }

        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(serve_connection(ctx, stream, peer_addr.to_string()));
    }

    fn configure_client_socket(stream: &TcpStream) -> Result<()> {
        use socket2::SockRef;

        let socket_ref = SockRef::from(stream);
        // Deliveries and confirmations are tiny frames
        socket_ref.set_tcp_nodelay(true)?;
        socket_ref.set_keepalive(true)?;
        Ok(())
    }

    /// Wait until every delivery task spawned so far has resolved.
    ///
    /// Only meaningful after shutdown; a delivery whose consumer never
    /// confirms nor disconnects keeps this pending forever.
    pub async fn wait_for_deliveries(&self) {
        self.deliveries.close();
        self.deliveries.wait().await;
    }
}
