//! Observability and Metrics
//!
//! Counters for radio traffic and command handling, collected with relaxed
//! atomics so any component can record without coordination.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for link operations
#[derive(Debug)]
pub struct Metrics {
    /// Packets handed to the transport
    pub packets_sent: AtomicU64,
    /// Well-formed packets received
    pub packets_received: AtomicU64,
    /// Complete messages transmitted
    pub messages_sent: AtomicU64,
    /// Complete messages reassembled
    pub messages_received: AtomicU64,
    /// Payload bytes transmitted
    pub bytes_sent: AtomicU64,
    /// Payload bytes reassembled
    pub bytes_received: AtomicU64,
    /// Packets dropped for carrying a foreign identifier
    pub crosstalk_discarded: AtomicU64,
    /// Packets dropped for being shorter than a header
    pub malformed_packets: AtomicU64,
    /// Listen calls that ended without a message
    pub listen_timeouts: AtomicU64,
    /// Send or receive failures reported by the transport
    pub transport_errors: AtomicU64,
    /// Command envelopes received
    pub commands_received: AtomicU64,
    /// Envelopes dropped for a wrong password or name
    pub commands_rejected: AtomicU64,
    /// Commands routed to a handler
    pub commands_dispatched: AtomicU64,
    /// Commands that failed to parse or execute
    pub command_errors: AtomicU64,
    /// Telemetry beacons transmitted
    pub beacons_sent: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            crosstalk_discarded: AtomicU64::new(0),
            malformed_packets: AtomicU64::new(0),
            listen_timeouts: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            commands_received: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            commands_dispatched: AtomicU64::new(0),
            command_errors: AtomicU64::new(0),
            beacons_sent: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one packet transmitted
    pub fn packet_sent(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one packet received
    pub fn packet_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message sent
    pub fn message_sent(&self, byte_count: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a message received
    pub fn message_received(&self, byte_count: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn crosstalk(&self) {
        self.crosstalk_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn malformed_packet(&self) {
        self.malformed_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn listen_timeout(&self) {
        self.listen_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_received(&self) {
        self.commands_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_rejected(&self) {
        self.commands_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_dispatched(&self) {
        self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_error(&self) {
        self.command_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn beacon_sent(&self) {
        self.beacons_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            crosstalk_discarded: self.crosstalk_discarded.load(Ordering::Relaxed),
            malformed_packets: self.malformed_packets.load(Ordering::Relaxed),
            listen_timeouts: self.listen_timeouts.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            commands_received: self.commands_received.load(Ordering::Relaxed),
            commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            command_errors: self.command_errors.load(Ordering::Relaxed),
            beacons_sent: self.beacons_sent.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            packets_sent = snapshot.packets_sent,
            packets_received = snapshot.packets_received,
            messages_sent = snapshot.messages_sent,
            messages_received = snapshot.messages_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            crosstalk_discarded = snapshot.crosstalk_discarded,
            malformed_packets = snapshot.malformed_packets,
            listen_timeouts = snapshot.listen_timeouts,
            transport_errors = snapshot.transport_errors,
            commands_received = snapshot.commands_received,
            commands_rejected = snapshot.commands_rejected,
            commands_dispatched = snapshot.commands_dispatched,
            command_errors = snapshot.command_errors,
            beacons_sent = snapshot.beacons_sent,
            uptime_seconds = snapshot.uptime_seconds,
            "Link metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub crosstalk_discarded: u64,
    pub malformed_packets: u64,
    pub listen_timeouts: u64,
    pub transport_errors: u64,
    pub commands_received: u64,
    pub commands_rejected: u64,
    pub commands_dispatched: u64,
    pub command_errors: u64,
    pub beacons_sent: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
