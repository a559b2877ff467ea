//! Inspection Policy Store
//!
//! Binds traffic to a configured inspection profile by destination address,
//! exposes the per-port filter bitmask used to gate session creation, and
//! supports an atomically-published staged configuration during live reload.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    PolicyHandle                        │
//! │                                                        │
//! │   live: ArcSwap<UdpPolicyConfig>   ◄── packet path     │
//! │   staged: Mutex<Option<UdpPolicyConfig>> ◄── reload    │
//! │                                                        │
//! │   commit_reload(): staged ──atomic swap──► live        │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! Packet processing reads the live configuration only; a reload mutates the
//! staged copy and publishes it at a single commit point, so in-flight
//! packets never observe a half-applied configuration.

#![warn(missing_docs)]

pub mod config;
pub mod handle;
pub mod port_filter;

pub use config::UdpPolicyConfig;
pub use handle::{ConfigTarget, PolicyHandle};
pub use port_filter::{PortAction, PortFilterTable, PORT_INSPECT, PORT_SESSION};

use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// Minimum session idle timeout (seconds)
pub const MIN_TIMEOUT: u64 = 1;

/// Maximum session idle timeout (seconds)
pub const MAX_TIMEOUT: u64 = 86_400;

/// Default session idle timeout (seconds)
pub const DEFAULT_TIMEOUT: u64 = 30;

/// Policy option flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct PolicyFlags(u16);

impl PolicyFlags {
    /// Skip inspection of unbound any→any rules for matching traffic.
    /// Only legal on the default policy.
    pub const IGNORE_ANY: u16 = 1 << 0;

    /// No flags set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check if flag is set
    #[inline(always)]
    pub const fn has(&self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    /// Set flag
    #[inline(always)]
    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }
}

/// One configured inspection profile.
///
/// A policy without bound addresses is the group's default and catches all
/// destinations no bound policy claims.
#[derive(Debug, Clone)]
pub struct UdpPolicy {
    /// Destination networks this policy is bound to; `None` marks the default
    pub bound_addrs: Option<Vec<IpNetwork>>,
    /// Session idle timeout in seconds, within `[MIN_TIMEOUT, MAX_TIMEOUT]`
    pub session_timeout: u64,
    /// Option flags
    pub flags: PolicyFlags,
}

impl UdpPolicy {
    /// Default policy with the stock timeout and no options
    pub fn default_policy() -> Self {
        Self {
            bound_addrs: None,
            session_timeout: DEFAULT_TIMEOUT,
            flags: PolicyFlags::empty(),
        }
    }

    /// Policy bound to a destination network set
    pub fn bound(networks: Vec<IpNetwork>, session_timeout: u64) -> Self {
        Self {
            bound_addrs: Some(networks),
            session_timeout,
            flags: PolicyFlags::empty(),
        }
    }

    /// Whether this is the group's default (unbound) policy
    #[inline]
    pub fn is_default(&self) -> bool {
        self.bound_addrs.is_none()
    }

    /// Whether this policy's bound-address set contains `addr`
    #[inline]
    pub fn binds(&self, addr: IpAddr) -> bool {
        match &self.bound_addrs {
            Some(networks) => networks.iter().any(|n| n.contains(addr)),
            None => false,
        }
    }
}
