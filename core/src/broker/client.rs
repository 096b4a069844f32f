use super::signal::ReadySignal;
use crate::protocol::{Message, SspqCodec};
use futures::SinkExt;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedWrite;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Delivery state of a connected client.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    /// Nothing requested, nothing in flight.
    Idle,
    /// Sitting in the ready-consumer queue waiting for a message.
    Requested,
    /// A message has been handed to this client and awaits confirmation.
    InFlight { attempt: u64, message: Message },
}

/// Broker-side state for one accepted connection.
///
/// The write half of the stream lives here so the delivery task holding the
/// client can push a message; the read half stays with the connection handler.
/// The delivery slot is only ever touched by the client's own handler and the
/// single delivery task bound to it, always under the slot lock.
pub struct Client {
    address: String,
    writer: tokio::sync::Mutex<Option<FramedWrite<BoxedWriter, SspqCodec>>>,
    slot: Mutex<Slot>,
    attempts: AtomicU64,
    ready: ReadySignal,
    connected: AtomicBool,
}

impl Client {
    pub fn new<W>(address: impl Into<String>, writer: W, codec: SspqCodec) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: BoxedWriter = Box::new(writer);
        Self {
            address: address.into(),
            writer: tokio::sync::Mutex::new(Some(FramedWrite::new(writer, codec))),
            slot: Mutex::new(Slot::Idle),
            attempts: AtomicU64::new(0),
            ready: ReadySignal::new(),
            connected: AtomicBool::new(true),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn ready(&self) -> &ReadySignal {
        &self.ready
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Whether a message is currently in flight to this client.
    pub fn has_pending(&self) -> bool {
        matches!(*self.slot.lock(), Slot::InFlight { .. })
    }

    pub fn pending(&self) -> Option<Message> {
        match &*self.slot.lock() {
            Slot::InFlight { message, .. } => Some(message.clone()),
            _ => None,
        }
    }

    /// Whether the client is already queued as a ready consumer.
    pub fn is_requested(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Requested)
    }

    /// Handle a RECEIVE. Returns false, changing nothing, if the client
    /// already has a message in flight or is already queued.
    pub fn request_delivery(&self) -> bool {
        let mut slot = self.slot.lock();
        if *slot != Slot::Idle {
            return false;
        }
        *slot = Slot::Requested;
        self.ready.clear();
        true
    }

    /// Handle a CONFIRM. Returns false, changing nothing, if there is no
    /// in-flight message to confirm.
    pub fn confirm(&self) -> bool {
        {
            let mut slot = self.slot.lock();
            if !matches!(*slot, Slot::InFlight { .. }) {
                return false;
            }
            *slot = Slot::Idle;
        }
        self.ready.set();
        true
    }

    /// Bind `message` to this client as its in-flight message and return the
    /// attempt id that owns it.
    pub fn begin_delivery(&self, message: Message) -> u64 {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
        *self.slot.lock() = Slot::InFlight { attempt, message };
        attempt
    }

    /// Take back the message bound by `attempt`, leaving the slot idle.
    ///
    /// `None` means that attempt was confirmed. A slot now holding a later
    /// attempt's message is left untouched.
    pub fn take_pending(&self, attempt: u64) -> Option<Message> {
        let mut slot = self.slot.lock();
        match &*slot {
            Slot::InFlight { attempt: current, .. } if *current == attempt => {}
            _ => return None,
        }
        match std::mem::replace(&mut *slot, Slot::Idle) {
            Slot::InFlight { message, .. } => Some(message),
            Slot::Idle | Slot::Requested => None,
        }
    }

    /// Flag the client as gone and wake any delivery waiting on it.
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.ready.set();
    }

    /// Write one frame to the client.
    pub async fn send(&self, message: &Message) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        let framed = writer.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "stream closed")
        })?;
        framed.send(message).await.map_err(|e| match e {
            crate::SspqCodecError::Io(io) => io,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        })
    }

    /// Shut down and release the write half. Idempotent.
    pub async fn close(&self) {
        let framed = self.writer.lock().await.take();
        if let Some(framed) = framed {
            let _ = framed.into_inner().shutdown().await;
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.address)
            .field("slot", &*self.slot.lock())
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    fn client() -> (Client, tokio::io::DuplexStream) {
        let (broker_side, peer_side) = tokio::io::duplex(1024);
        (Client::new("test", broker_side, SspqCodec::new()), peer_side)
    }

    #[test]
    fn test_request_only_from_idle() {
        let (client, _peer) = client();
        assert!(client.request_delivery());
        assert!(client.is_requested());
        assert!(!client.request_delivery());

        client.begin_delivery(Message::send("a", 1));
        assert!(!client.request_delivery());
        assert!(client.has_pending());
    }

    #[test]
    fn test_confirm_requires_in_flight() {
        let (client, _peer) = client();
        assert!(!client.confirm());
        assert!(!client.ready().is_set());

        let attempt = client.begin_delivery(Message::send("a", 1));
        assert!(client.confirm());
        assert!(!client.has_pending());
        assert!(client.ready().is_set());
        assert!(client.take_pending(attempt).is_none());
    }

    #[test]
    fn test_request_clears_ready_signal() {
        let (client, _peer) = client();
        client.ready().set();
        assert!(client.request_delivery());
        assert!(!client.ready().is_set());
    }

    #[test]
    fn test_take_pending_leaves_requested_untouched() {
        let (client, _peer) = client();
        let attempt = client.begin_delivery(Message::send("a", 1));
        assert!(client.confirm());
        client.request_delivery();
        assert!(client.take_pending(attempt).is_none());
        assert!(client.is_requested());
    }

    #[test]
    fn test_stale_attempt_cannot_take_later_message() {
        let (client, _peer) = client();
        let first = client.begin_delivery(Message::send("m1", 1));
        assert!(client.confirm());
        assert!(client.request_delivery());
        let second = client.begin_delivery(Message::send("m2", 2));
        assert_ne!(first, second);

        assert!(client.take_pending(first).is_none());
        assert_eq!(client.pending(), Some(Message::send("m2", 2)));
        assert_eq!(client.take_pending(second), Some(Message::send("m2", 2)));
        assert!(!client.has_pending());
    }

    #[test]
    fn test_disconnect_sets_signal() {
        let (client, _peer) = client();
        assert!(client.is_connected());
        client.mark_disconnected();
        assert!(!client.is_connected());
        assert!(client.ready().is_set());
    }

    #[tokio::test]
    async fn test_send_then_close() {
        let (client, peer) = client();
        client.send(&Message::send("hello", 2)).await.unwrap();

        let mut frames = FramedRead::new(peer, SspqCodec::new());
        let received = frames.next().await.unwrap().unwrap();
        assert_eq!(&received.payload[..], b"hello");
        assert_eq!(received.retries, 2);

        client.close().await;
        assert!(frames.next().await.is_none());
        assert!(client.send(&Message::send("late", 0)).await.is_err());
    }
}
