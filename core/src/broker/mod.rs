//! # SSPQ Broker Module
//!
//! The delivery engine: accepting connections, matching producers with
//! consumers, and tracking every in-flight message until it is confirmed,
//! retried, dead-lettered or dropped.
//!
//! ## Architecture
//!
//! ```text
//!  connection ──SEND──▶ ingress ─────┐
//!   handler                          ├──▶ dispatcher ──▶ delivery task ──▶ client stream
//!           ──RECEIVE─▶ ready queue ─┘                        │
//!           ──CONFIRM─▶ ready signal ─────────────────────────┘
//!                                                             └──▶ ingress (retry)
//!                                                             └──▶ dead-letter sink
//! ```
//!
//! - [`server`] - TCP listener, accept loop and shutdown
//! - [`handler`] - per-connection read loop and dispatch by message type
//! - [`dispatcher`] - pairs one message with one connected ready consumer
//! - [`delivery`] - send / await confirmation / retry-or-dead-letter
//! - [`client`] - broker-side consumer state and its single delivery slot
//! - [`queue`] - unbounded FIFO shared by all of the above
//! - [`signal`] - per-client confirmation signal
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use sspq::{BrokerConfig, BrokerServer};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> sspq::Result<()> {
//!     let server = BrokerServer::new(BrokerConfig::default())?;
//!     let listener = TcpListener::bind("127.0.0.1:0").await?;
//!     server.serve(listener).await
//! }
//! ```

pub mod client;
pub mod context;
pub mod delivery;
pub mod dispatcher;
pub mod handler;
pub mod queue;
pub mod server;
pub mod signal;

pub use client::Client;
pub use context::BrokerContext;
pub use delivery::{deliver, settle_failed, DeliveryOutcome};
pub use dispatcher::Dispatcher;
pub use handler::{serve_connection, ConnectionHandler, DisconnectReason};
pub use queue::Fifo;
pub use server::BrokerServer;
pub use signal::{ReadyListener, ReadySignal};
