//! # SSPQ Protocol Module
//!
//! Every frame on an SSPQ connection is a [`Message`]: a type tag, an opaque
//! payload and a retry counter.
//!
//! - **SEND** (producer → broker): enqueue the payload for delivery
//! - **RECEIVE** (consumer → broker): ask for the next message
//! - **CONFIRM** (consumer → broker): acknowledge the in-flight message
//!
//! Deliveries from the broker to a consumer reuse the SEND frame carrying
//! the message's current retry counter.
//!
//! ## Modules
//!
//! - [`message`] - message model and retry bookkeeping
//! - [`codec`] - `tokio_util` framing codec

pub mod codec;
pub mod message;

pub use codec::{SspqCodec, SspqCodecError};
pub use message::*;
