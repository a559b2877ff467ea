//! Tracker statistics
//!
//! Aggregate counters produced for telemetry and rule evaluation, with a
//! serializable snapshot for export.

use nids_common::AtomicCounter;
use serde::Serialize;

/// Running counters for the UDP tracker
#[derive(Debug, Default)]
pub struct StreamStats {
    /// Sessions created via the cache (excludes in-place recycles)
    pub total_sessions: AtomicCounter,
    /// Payload records initialized
    pub sessions_created: AtomicCounter,
    /// Payload records released at teardown
    pub sessions_released: AtomicCounter,
    /// Teardowns with neither timeout nor prune flag
    pub closed_normally: AtomicCounter,
    /// Teardowns of timed-out sessions
    pub closed_timed_out: AtomicCounter,
    /// Teardowns of pruned sessions
    pub closed_pruned: AtomicCounter,
    /// Packets dropped by policy miss or port-filter discard
    pub filtered_packets: AtomicCounter,
    /// Session creations degraded to stateless handling
    pub pool_exhausted: AtomicCounter,
}

impl StreamStats {
    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            total_sessions: self.total_sessions.get(),
            sessions_created: self.sessions_created.get(),
            sessions_released: self.sessions_released.get(),
            closed_normally: self.closed_normally.get(),
            closed_timed_out: self.closed_timed_out.get(),
            closed_pruned: self.closed_pruned.get(),
            filtered_packets: self.filtered_packets.get(),
            pool_exhausted: self.pool_exhausted.get(),
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        self.total_sessions.reset();
        self.sessions_created.reset();
        self.sessions_released.reset();
        self.closed_normally.reset();
        self.closed_timed_out.reset();
        self.closed_pruned.reset();
        self.filtered_packets.reset();
        self.pool_exhausted.reset();
    }
}

/// Non-atomic stats snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamStatsSnapshot {
    /// Sessions created via the cache
    pub total_sessions: u64,
    /// Payload records initialized
    pub sessions_created: u64,
    /// Payload records released
    pub sessions_released: u64,
    /// Normal teardowns
    pub closed_normally: u64,
    /// Timed-out teardowns
    pub closed_timed_out: u64,
    /// Pruned teardowns
    pub closed_pruned: u64,
    /// Filtered packets
    pub filtered_packets: u64,
    /// Stateless degradations
    pub pool_exhausted: u64,
}
