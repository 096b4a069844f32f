//! # SSPQ Core Library
//!
//! SSPQ (Super Simple Queue) is a minimal confirm-or-retry message broker.
//! Producers submit messages over TCP, consumers ask for one message at a time
//! and must confirm it before asking again. A message whose consumer goes away
//! without confirming is retried a bounded number of times and then routed to
//! a dead-letter sink, or dropped when dead-lettering is disabled.
//!
//! ## Architecture Overview
//!
//! - [`broker`] - TCP server, per-connection handlers, the dispatcher and the
//!   delivery state machine
//! - [`protocol`] - message model and the `SSPQ` wire codec
//! - [`config`] - broker configuration and the ordered [`LogLevel`]
//! - [`metrics`] - lock-free delivery counters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sspq::{BrokerConfig, BrokerServer};
//!
//! #[tokio::main]
//! async fn main() -> sspq::Result<()> {
//!     let config = BrokerConfig::default().with_address("0.0.0.0", 8888);
//!     let server = BrokerServer::new(config)?;
//!     server.run().await
//! }
//! ```
//!
//! ## Delivery guarantees
//!
//! - At most one in-flight message per consumer.
//! - Every submitted message ends confirmed, dead-lettered or dropped.
//! - Ordering is best-effort FIFO; a retried message re-enters at the back.

pub mod broker;
pub mod config;
pub mod metrics;
pub mod protocol;

pub use broker::{BrokerContext, BrokerServer, Client, DeliveryOutcome, Dispatcher, Fifo};
pub use config::{BrokerConfig, LogLevel, SSPQ_PORT};
pub use metrics::{BrokerMetrics, MetricsSnapshot};
pub use protocol::{Message, MessageType, SspqCodec, SspqCodecError, UNLIMITED_RETRIES};

use thiserror::Error;

/// SSPQ error types
///
/// Only listener setup and configuration surface as errors. Failures inside a
/// connection or a delivery are resolved locally into a disconnect or a
/// retry/dead-letter decision and never reach a caller.
#[derive(Debug, Error)]
pub enum SspqError {
    /// Socket and stream I/O failures
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire framing errors
    #[error("Codec error: {0}")]
    Codec(#[from] SspqCodecError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for SSPQ operations
pub type Result<T> = std::result::Result<T, SspqError>;
