//! OpenNIDS Common - Shared types for the stream-inspection core
//!
//! This crate provides the primitives shared by the policy store and the
//! flow/session tracker:
//! - Flow keys and endpoint pairs
//! - Packet metadata consumed by the trackers
//! - Timestamps and lock-free counters
//! - Configuration error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flow;

pub use error::*;
pub use flow::*;

use std::sync::atomic::{AtomicU64, Ordering};

/// Wall-clock timestamp with one-second granularity.
///
/// Session expiry deadlines are advisory and checked lazily at the next
/// packet for a key, so sub-second precision buys nothing here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Get current timestamp (seconds since epoch)
    #[inline(always)]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    /// Build from raw seconds (packet capture timestamps)
    #[inline(always)]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Seconds since epoch
    #[inline(always)]
    pub const fn as_secs(&self) -> u64 {
        self.0
    }

    /// Deadline this many seconds in the future
    #[inline(always)]
    pub const fn plus(&self, secs: u64) -> Self {
        Self(self.0 + secs)
    }
}

/// High-performance counter for lock-free metrics
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    /// Create new counter
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Increment and return previous value
    #[inline(always)]
    pub fn inc(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Add value and return previous
    #[inline(always)]
    pub fn add(&self, val: u64) -> u64 {
        self.0.fetch_add(val, Ordering::Relaxed)
    }

    /// Get current value
    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Reset to zero
    #[inline(always)]
    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed)
    }
}
