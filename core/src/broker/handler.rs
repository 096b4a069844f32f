use super::client::Client;
use super::context::BrokerContext;
use crate::protocol::{Message, MessageType, SspqCodec};
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

/// Why a connection's read loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    EndOfStream,
    Framing(String),
}

/// Reads frames from one connection and applies them to the broker.
///
/// Owns the client's lifecycle: it is the only place a client becomes
/// disconnected.
pub struct ConnectionHandler {
    ctx: Arc<BrokerContext>,
    client: Arc<Client>,
}

impl ConnectionHandler {
    pub fn new(ctx: Arc<BrokerContext>, client: Arc<Client>) -> Self {
        Self { ctx, client }
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// Run the read loop until end-of-stream or a framing error, then tear
    /// the client down.
    pub async fn run<R>(self, reader: R) -> DisconnectReason
    where
        R: AsyncRead + Unpin,
    {
        let mut frames = FramedRead::new(reader, self.ctx.codec());

        let reason = loop {
            match frames.next().await {
                Some(Ok(message)) => self.handle_message(message).await,
                Some(Err(e)) => {
                    warn!(
                        "User({}) disconnected because: {}",
                        self.client.address(),
                        e
                    );
                    break DisconnectReason::Framing(e.to_string());
                }
                None => {
                    info!("User({}) disconnected", self.client.address());
                    break DisconnectReason::EndOfStream;
                }
            }
        };

        let was_queued = self.client.is_requested();
        self.client.mark_disconnected();
        if was_queued {
            let swept = self
                .ctx
                .ready_consumers
                .retain(|client| client.is_connected());
            debug!("Swept {} disconnected consumers from the ready queue", swept);
        }
        self.client.close().await;
        reason
    }

    pub async fn handle_message(&self, message: Message) {
        match message.message_type {
            MessageType::Send => {
                debug!("Received: {}", message.payload_lossy());
                self.ctx.metrics.message_received();
                self.ctx.ingress.push(message);
            }
            MessageType::Receive => {
                if !self.client.request_delivery() {
                    warn!(
                        "Receive from User({}) dropped: client must confirm its message first",
                        self.client.address()
                    );
                    self.ctx.metrics.protocol_violation();
                    return;
                }
                debug!("User({}) wants to receive", self.client.address());
                self.ctx.ready_consumers.push(Arc::clone(&self.client));
            }
            MessageType::Confirm => {
                if !self.client.confirm() {
                    warn!(
                        "Confirm from User({}) dropped: client has no message to confirm",
                        self.client.address()
                    );
                    self.ctx.metrics.protocol_violation();
                    return;
                }
                debug!("User({}) confirms message", self.client.address());
                tokio::task::yield_now().await;
            }
            MessageType::Unknown(code) => {
                warn!(
                    "Received unknown packet (type {}) from User({}): {:02x?}",
                    code,
                    self.client.address(),
                    &message.payload[..]
                );
                self.ctx.metrics.unknown_frame();
            }
        }
    }
}

/// Serve one accepted stream for its whole lifetime.
pub async fn serve_connection<S>(ctx: Arc<BrokerContext>, stream: S, address: String)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let client = Arc::new(Client::new(address, writer, ctx.codec()));

    info!("User({}) connected", client.address());
    ctx.metrics.connection_opened();

    let reason = ConnectionHandler::new(Arc::clone(&ctx), client).run(reader).await;
    debug!("Connection handler finished: {:?}", reason);

    ctx.metrics.connection_closed();
}
