//! Ordered policy collection with a single default
//!
//! Policies are appended in configuration order; resolution walks bound
//! policies first and falls back to the default. Validation happens at load
//! time so the packet path never sees an out-of-range timeout or a
//! conflicting default.

use crate::port_filter::PortFilterTable;
use crate::{PolicyFlags, UdpPolicy, MAX_TIMEOUT, MIN_TIMEOUT};
use nids_common::{ConfigError, ConfigResult};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered set of UDP inspection policies plus the per-port filter table.
#[derive(Debug, Clone, Default)]
pub struct UdpPolicyConfig {
    policies: Vec<Arc<UdpPolicy>>,
    default_policy: Option<Arc<UdpPolicy>>,
    port_filter: PortFilterTable,
}

impl UdpPolicyConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validated policy.
    ///
    /// Fails when the timeout is out of bounds, when a second default policy
    /// is registered, or when `IGNORE_ANY` is set on a bound policy. On
    /// failure the configuration is left unchanged.
    pub fn add_policy(&mut self, policy: UdpPolicy) -> ConfigResult<()> {
        if policy.session_timeout < MIN_TIMEOUT || policy.session_timeout > MAX_TIMEOUT {
            return Err(ConfigError::TimeoutOutOfRange {
                value: policy.session_timeout,
                min: MIN_TIMEOUT,
                max: MAX_TIMEOUT,
            });
        }

        if policy.is_default() {
            if self.default_policy.is_some() {
                return Err(ConfigError::DuplicateDefaultPolicy);
            }
        } else if policy.flags.has(PolicyFlags::IGNORE_ANY) {
            return Err(ConfigError::IgnoreAnyOnBoundPolicy);
        }

        let policy = Arc::new(policy);
        if policy.is_default() {
            self.default_policy = Some(Arc::clone(&policy));
        }
        self.policies.push(policy);
        Ok(())
    }

    /// Resolve the policy for a packet's destination address.
    ///
    /// Walks bound policies in configuration order, then the default. `None`
    /// means the caller must skip tracking and count the packet as filtered.
    pub fn resolve_policy(&self, dst: IpAddr) -> Option<Arc<UdpPolicy>> {
        for policy in &self.policies {
            if policy.is_default() {
                continue;
            }
            if policy.binds(dst) {
                debug!(%dst, "resolved bound UDP policy");
                return Some(Arc::clone(policy));
            }
        }
        self.default_policy.as_ref().map(Arc::clone)
    }

    /// Post-parse verification.
    ///
    /// Fails when no policies were configured; otherwise derives the
    /// port-inspection behavior from the default policy's ignore-any flag.
    /// Session-cache initialization is checked by the stream tracker, which
    /// owns the cache.
    pub fn verify(&mut self) -> ConfigResult<()> {
        if self.policies.is_empty() {
            return Err(ConfigError::NoPolicies);
        }
        let ignore_any = self
            .default_policy
            .as_ref()
            .map(|p| p.flags.has(PolicyFlags::IGNORE_ANY))
            .unwrap_or(false);
        self.port_filter.set_ignore_any(ignore_any);
        Ok(())
    }

    /// Log the configured policies at info level
    pub fn log_config(&self) {
        for policy in &self.policies {
            info!(
                timeout_secs = policy.session_timeout,
                ignore_any_rules = policy.flags.has(PolicyFlags::IGNORE_ANY),
                default = policy.is_default(),
                "UDP policy configured"
            );
        }
    }

    /// Number of configured policies
    pub fn num_policies(&self) -> usize {
        self.policies.len()
    }

    /// The default (unbound) policy, if one was configured
    pub fn default_policy(&self) -> Option<&Arc<UdpPolicy>> {
        self.default_policy.as_ref()
    }

    /// The per-port filter table
    pub fn port_filter(&self) -> &PortFilterTable {
        &self.port_filter
    }

    /// Mutable access for rule loading
    pub fn port_filter_mut(&mut self) -> &mut PortFilterTable {
        &mut self.port_filter
    }
}
