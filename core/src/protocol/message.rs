use bytes::Bytes;
use std::fmt;

/// Retry value meaning "retry forever"; never decremented.
pub const UNLIMITED_RETRIES: u8 = u8::MAX;

/// Frame type tag.
///
/// Anything the broker does not recognise decodes as [`MessageType::Unknown`]
/// with the raw code preserved for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Send,
    Receive,
    Confirm,
    Unknown(u8),
}

impl MessageType {
    pub const SEND_CODE: u8 = 1;
    pub const RECEIVE_CODE: u8 = 2;
    pub const CONFIRM_CODE: u8 = 3;

    pub fn from_code(code: u8) -> Self {
        match code {
            Self::SEND_CODE => MessageType::Send,
            Self::RECEIVE_CODE => MessageType::Receive,
            Self::CONFIRM_CODE => MessageType::Confirm,
            other => MessageType::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            MessageType::Send => Self::SEND_CODE,
            MessageType::Receive => Self::RECEIVE_CODE,
            MessageType::Confirm => Self::CONFIRM_CODE,
            MessageType::Unknown(code) => code,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Send => write!(f, "SEND"),
            MessageType::Receive => write!(f, "RECEIVE"),
            MessageType::Confirm => write!(f, "CONFIRM"),
            MessageType::Unknown(code) => write!(f, "UNKNOWN({})", code),
        }
    }
}

/// One unit of protocol traffic.
///
/// The same structure is used for producer submissions, consumer requests
/// and the deliveries the broker writes back to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_type: MessageType,
    pub payload: Bytes,
    pub retries: u8,
}

impl Message {
    pub fn new(message_type: MessageType, payload: impl Into<Bytes>, retries: u8) -> Self {
        Self {
            message_type,
            payload: payload.into(),
            retries,
        }
    }

    /// A producer submission carrying `payload`.
    pub fn send(payload: impl Into<Bytes>, retries: u8) -> Self {
        Self::new(MessageType::Send, payload, retries)
    }

    /// A consumer request for the next message.
    pub fn receive() -> Self {
        Self::new(MessageType::Receive, Bytes::new(), 0)
    }

    /// A consumer acknowledgement of its in-flight message.
    pub fn confirm() -> Self {
        Self::new(MessageType::Confirm, Bytes::new(), 0)
    }

    pub fn has_unlimited_retries(&self) -> bool {
        self.retries == UNLIMITED_RETRIES
    }

    /// Spend one retry after a failed delivery.
    ///
    /// Returns `false` when the message is exhausted (`retries == 0`) and must
    /// not be requeued. The unlimited sentinel is never decremented.
    pub fn consume_retry(&mut self) -> bool {
        match self.retries {
            0 => false,
            UNLIMITED_RETRIES => true,
            _ => {
                self.retries -= 1;
                true
            }
        }
    }

    /// Payload rendered for logs.
    pub fn payload_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
