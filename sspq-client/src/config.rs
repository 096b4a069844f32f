//! Configuration types for the SSPQ client

use sspq::SSPQ_PORT;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Broker address (`host:port`)
    pub address: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// How long `receive` waits for a delivery; `None` waits forever
    pub receive_timeout: Option<Duration>,
    /// Largest payload accepted from the broker
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", SSPQ_PORT),
            connect_timeout: Duration::from_secs(30),
            receive_timeout: None,
            max_frame_size: sspq::protocol::codec::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
