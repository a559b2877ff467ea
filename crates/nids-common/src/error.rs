//! Error types for OpenNIDS
//!
//! Configuration errors are fatal at load time and never at packet time;
//! every packet-path condition (pool exhaustion, policy miss, stale session)
//! is reported through outcomes and counters instead.

use thiserror::Error;

/// Configuration-time error. The host decides whether to abort startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Session idle timeout outside the permitted bounds
    #[error("invalid session timeout {value}s: must be between {min} and {max}")]
    TimeoutOutOfRange {
        /// Rejected value
        value: u64,
        /// Lower bound (inclusive)
        min: u64,
        /// Upper bound (inclusive)
        max: u64,
    },

    /// A default (unbound) policy was already registered for this group
    #[error("default policy already set: additional policies must be bound to a host or network")]
    DuplicateDefaultPolicy,

    /// The ignore-any-rules flag is only legal on the default policy
    #[error("\"ignore_any_rules\" can only be used with the default policy")]
    IgnoreAnyOnBoundPolicy,

    /// Post-parse verification found no configured policies
    #[error("no inspection policies configured")]
    NoPolicies,

    /// Session cache could not be initialized
    #[error("session cache init failed: {0}")]
    CacheInit(String),

    /// Session pool could not be initialized
    #[error("session pool init failed: {0}")]
    PoolInit(String),
}

/// Result type for configuration paths
pub type ConfigResult<T> = Result<T, ConfigError>;
