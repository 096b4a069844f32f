//! Per-attempt delivery state machine.
//!
//! ```text
//! PENDING_DELIVERY -> AWAITING_CONFIRMATION -+-> CONFIRMED
//!                                            +-> RETRY        (back to ingress)
//!                                            +-> DEAD_LETTER  (dead-letter sink)
//!                                            +-> DROP
//! ```
//!
//! There is no timeout. The only ways out of `AWAITING_CONFIRMATION` are a
//! CONFIRM from the client or the client's disconnect.

use super::client::Client;
use super::context::BrokerContext;
use crate::protocol::Message;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Terminal state of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Confirmed,
    Retried,
    DeadLettered,
    Dropped,
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryOutcome::Confirmed => "confirmed",
            DeliveryOutcome::Retried => "retried",
            DeliveryOutcome::DeadLettered => "dead-lettered",
            DeliveryOutcome::Dropped => "dropped",
        };
        f.write_str(name)
    }
}

/// Deliver `message` to `client` and resolve the attempt.
pub async fn deliver(
    ctx: Arc<BrokerContext>,
    client: Arc<Client>,
    message: Message,
) -> DeliveryOutcome {
    ctx.metrics.delivery_started();
    let attempt = client.begin_delivery(message.clone());

    // Listen before writing so a confirmation racing the write is not lost
    let listener = client.ready().listen();
    if let Err(e) = client.send(&message).await {
        // The handler sees the broken stream on its side and signals us
        warn!("Failed to deliver to User({}): {}", client.address(), e);
    }
    listener.wait().await;

    let outcome = match client.take_pending(attempt) {
        None => {
            ctx.metrics.delivery_confirmed();
            DeliveryOutcome::Confirmed
        }
        Some(unconfirmed) => settle_failed(&ctx, unconfirmed),
    };

    debug!(
        "Delivery of '{}' to User({}) {}",
        message.payload_lossy(),
        client.address(),
        outcome
    );
    outcome
}

/// Decide the fate of a message whose consumer went away without confirming.
pub fn settle_failed(ctx: &BrokerContext, mut message: Message) -> DeliveryOutcome {
    if message.consume_retry() {
        ctx.metrics.delivery_retried();
        ctx.ingress.push(message);
        DeliveryOutcome::Retried
    } else if ctx.dead_letter_enabled() {
        ctx.metrics.delivery_dead_lettered();
        ctx.dead_letters.push(message);
        DeliveryOutcome::DeadLettered
    } else {
        ctx.metrics.delivery_dropped();
        DeliveryOutcome::Dropped
    }
}
