//! Metrics for store traffic and bookkeeping.
//!
//! All recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

use crate::core_router::MessageKind;

pub const MESSAGES_SENT: &str = "entangld.messages.sent";
pub const MESSAGES_RECEIVED: &str = "entangld.messages.received";
pub const ORPHANS_CLEANED: &str = "entangld.orphans.cleaned";
pub const VALUES_DROPPED: &str = "entangld.values.dropped";
pub const REQUESTS_PENDING: &str = "entangld.requests.pending";
pub const SUBSCRIPTIONS_ACTIVE: &str = "entangld.subscriptions.active";
pub const REMOTE_GET_DURATION: &str = "entangld.get.remote.duration_ms";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(MESSAGES_SENT, "Messages handed to the transport, by type");
    describe_counter!(MESSAGES_RECEIVED, "Messages accepted by receive, by type");
    describe_counter!(ORPHANS_CLEANED, "Unmatched events answered with an unsubscribe");
    describe_counter!(VALUES_DROPPED, "Value messages with no pending request");
    describe_gauge!(REQUESTS_PENDING, "Forwarded gets awaiting a value");
    describe_gauge!(SUBSCRIPTIONS_ACTIVE, "Local and pass-through subscriptions held");
    describe_histogram!(REMOTE_GET_DURATION, "Round trip of a forwarded get in milliseconds");
}

pub fn message_sent(kind: MessageKind) {
    counter!(MESSAGES_SENT, "kind" => kind.as_str()).increment(1);
}

pub fn message_received(kind: MessageKind) {
    counter!(MESSAGES_RECEIVED, "kind" => kind.as_str()).increment(1);
}

pub fn orphan_cleaned() {
    counter!(ORPHANS_CLEANED).increment(1);
}

pub fn value_dropped() {
    counter!(VALUES_DROPPED).increment(1);
}

pub fn pending_requests(count: usize) {
    gauge!(REQUESTS_PENDING).set(count as f64);
}

pub fn active_subscriptions(count: usize) {
    gauge!(SUBSCRIPTIONS_ACTIVE).set(count as f64);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(self.name).record(duration.as_secs_f64() * 1000.0);
    }
}
