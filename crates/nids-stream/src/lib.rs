//! Connectionless Flow Tracker
//!
//! Session tracking for UDP: packets are bound to bidirectional flow
//! sessions so rule evaluation downstream can reason about direction,
//! establishment, and per-flow state for a protocol that has none of its
//! own.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      UdpStreamTracker                        │
//! │                                                              │
//! │  packet ──► policy ──► port ──► session ──► expiry ──► dir   │
//! │             resolve    filter   acquire     recycle  track   │
//! │                │                   │           │             │
//! │        PolicyHandle          SessionCache  SessionPool       │
//! │        (nids-policy)         (bounded map) (payload slots)   │
//! │                                                              │
//! │  capabilities: ExpectedSessionRegistry · HaReplicator        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tracker is single-threaded; deploy one per packet-processing thread
//! and share the policy handle. Sessions time out lazily: an expired flow
//! is torn down and rebuilt by the next packet that touches it, so no
//! background sweeper is required.

#![warn(missing_docs)]

pub mod cache;
pub mod caps;
pub mod manager;
pub mod pool;
pub mod session;
pub mod stats;

pub use cache::{SessionCache, DEFAULT_NOMINAL_TIMEOUT, DEFAULT_PRUNING_TIMEOUT};
pub use caps::{ExpectedSessionRegistry, HaReplicator, NoExpectedSessions, NoHaPeer};
pub use manager::{Disposition, ProcessOutcome, TrackerConfig, UdpStreamTracker};
pub use pool::SessionPool;
pub use session::{
    Direction, FlowSession, HaFlags, IgnoreDirection, SessionFlags, SessionPayload, UdpPayload,
};
pub use stats::{StreamStats, StreamStatsSnapshot};
