//! # Broker metrics
//!
//! Lock-free counters updated on the delivery path. Everything uses relaxed
//! or acquire/release atomics; nothing here is consulted when deciding what
//! happens to a message.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Ensure hot counters sit on their own cache line
#[repr(align(64))]
#[derive(Debug, Default)]
struct CacheLineAligned<T>(T);

#[derive(Debug, Default)]
pub struct BrokerMetrics {
    active_connections: CacheLineAligned<AtomicUsize>,
    messages_received: CacheLineAligned<AtomicU64>,
    deliveries_started: AtomicU64,
    confirmed: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
    dropped: AtomicU64,
    protocol_violations: AtomicU64,
    unknown_frames: AtomicU64,
}

/// Point-in-time copy of [`BrokerMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub active_connections: usize,
    pub messages_received: u64,
    pub deliveries_started: u64,
    pub confirmed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub dropped: u64,
    pub protocol_violations: u64,
    pub unknown_frames: u64,
}

impl BrokerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn connection_opened(&self) {
        self.active_connections.0.fetch_add(1, Ordering::AcqRel);
    }

    #[inline(always)]
    pub fn connection_closed(&self) {
        self.active_connections.0.fetch_sub(1, Ordering::AcqRel);
    }

    #[inline(always)]
    pub fn message_received(&self) {
        self.messages_received.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_started(&self) {
        self.deliveries_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_confirmed(&self) {
        self.confirmed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_violation(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unknown_frame(&self) {
        self.unknown_frames.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn active_connections(&self) -> usize {
        self.active_connections.0.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_connections: self.active_connections(),
            messages_received: self.messages_received.0.load(Ordering::Relaxed),
            deliveries_started: self.deliveries_started.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            unknown_frames: self.unknown_frames.load(Ordering::Relaxed),
        }
    }
}
