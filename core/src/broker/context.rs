use super::client::Client;
use super::queue::Fifo;
use crate::config::BrokerConfig;
use crate::metrics::BrokerMetrics;
use crate::protocol::{Message, SspqCodec};
use std::sync::Arc;

/// Shared state threaded into every handler, the dispatcher and every
/// delivery task.
#[derive(Debug)]
pub struct BrokerContext {
    /// Messages waiting for a consumer
    pub ingress: Fifo<Message>,
    /// Consumers waiting for a message
    pub ready_consumers: Fifo<Arc<Client>>,
    /// Messages that ran out of retries; drained externally
    pub dead_letters: Fifo<Message>,
    pub metrics: BrokerMetrics,
    dead_letter_enabled: bool,
    max_frame_size: usize,
}

impl BrokerContext {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            ingress: Fifo::new(),
            ready_consumers: Fifo::new(),
            dead_letters: Fifo::new(),
            metrics: BrokerMetrics::new(),
            dead_letter_enabled: config.dead_letter_queue,
            max_frame_size: config.max_frame_size,
        }
    }

    pub fn dead_letter_enabled(&self) -> bool {
        self.dead_letter_enabled
    }

    pub fn codec(&self) -> SspqCodec {
        SspqCodec::with_max_frame_size(self.max_frame_size)
    }
}
