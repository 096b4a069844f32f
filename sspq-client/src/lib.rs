//! # SSPQ Client Library
//!
//! An async client for the SSPQ broker built on tokio.
//!
//! ## Producer Example
//!
//! ```rust,no_run
//! use sspq_client::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut client = SspqClient::connect_to("127.0.0.1:8888").await?;
//!     // Retry up to three times if a consumer fails to confirm
//!     client.send("Hello SSPQ!", 3).await?;
//!     client.close().await
//! }
//! ```
//!
//! ## Consumer Example
//!
//! ```rust,no_run
//! use sspq_client::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut client = SspqClient::connect_to("127.0.0.1:8888").await?;
//!     loop {
//!         let delivery = client.receive().await?;
//!         println!("{}", String::from_utf8_lossy(&delivery.payload));
//!         client.confirm().await?;
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::{Delivery, SspqClient};
pub use config::ClientConfig;
pub use error::{Result, SspqClientError};
pub use sspq::UNLIMITED_RETRIES;
