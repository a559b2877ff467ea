//! Session cache collaborator
//!
//! Capacity-bounded map from flow key to session. The tracker consumes only
//! this contract: create, lookup, delete-by-key, purge, capacity, and the
//! prune counter. Eviction hands the reclaimed session back to the caller,
//! which runs the teardown routine; nothing is dropped without it.

use crate::session::{FlowSession, SessionFlags};
use nids_common::{ConfigError, ConfigResult, FlowKey, Timestamp};
use std::collections::HashMap;
use tracing::debug;

/// Default idle age (seconds) at which a session is preferred for pruning
pub const DEFAULT_PRUNING_TIMEOUT: u64 = 30;

/// Default timeout (seconds) assumed for sessions with no armed deadline
pub const DEFAULT_NOMINAL_TIMEOUT: u64 = 180;

/// Bounded session store with oldest-first pruning under capacity pressure.
pub struct SessionCache {
    map: HashMap<FlowKey, FlowSession>,
    capacity: usize,
    pruning_timeout: u64,
    nominal_timeout: u64,
    prunes: u64,
}

impl SessionCache {
    /// Create a cache holding at most `capacity` sessions
    pub fn with_capacity(
        capacity: usize,
        pruning_timeout: u64,
        nominal_timeout: u64,
    ) -> ConfigResult<Self> {
        if capacity == 0 {
            return Err(ConfigError::CacheInit(
                "cache capacity must be non-zero".into(),
            ));
        }
        Ok(Self {
            map: HashMap::with_capacity(capacity),
            capacity,
            pruning_timeout,
            nominal_timeout,
            prunes: 0,
        })
    }

    /// Find the session for a key
    #[inline]
    pub fn lookup(&mut self, key: &FlowKey) -> Option<&mut FlowSession> {
        self.map.get_mut(key)
    }

    /// Whether a session exists for a key
    #[inline]
    pub fn contains(&self, key: &FlowKey) -> bool {
        self.map.contains_key(key)
    }

    /// Insert a fresh session for `key`, evicting a victim when full.
    ///
    /// The evicted session, if any, is marked `PRUNED` and returned to the
    /// caller for teardown before the new session reference.
    pub fn create(&mut self, key: FlowKey, now: Timestamp) -> (Option<FlowSession>, &mut FlowSession) {
        let victim = if self.map.len() >= self.capacity {
            self.evict(now)
        } else {
            None
        };

        let session = self.map.entry(key).or_insert_with(|| FlowSession::new(key, now));
        (victim, session)
    }

    /// Remove the session for a key, returning it for teardown
    pub fn remove(&mut self, key: &FlowKey) -> Option<FlowSession> {
        self.map.remove(key)
    }

    /// Drain every session for teardown (engine flush/shutdown)
    pub fn purge(&mut self) -> Vec<FlowSession> {
        self.map.drain().map(|(_, session)| session).collect()
    }

    /// Pick the reclamation victim: a stale session if one exists, otherwise
    /// the least recently seen. Stale means past the armed deadline, past the
    /// nominal timeout when no deadline is armed, or idle beyond the pruning
    /// timeout.
    fn evict(&mut self, now: Timestamp) -> Option<FlowSession> {
        let stale = self
            .map
            .iter()
            .find(|(_, s)| {
                let idle = now.as_secs().saturating_sub(s.last_seen.as_secs());
                let expired = if s.expire_at != 0 {
                    now.as_secs() > s.expire_at
                } else {
                    idle > self.nominal_timeout
                };
                expired || idle > self.pruning_timeout
            })
            .map(|(k, _)| *k);

        let victim_key = stale.or_else(|| {
            self.map
                .iter()
                .min_by_key(|(_, s)| s.last_seen)
                .map(|(k, _)| *k)
        })?;

        let mut victim = self.map.remove(&victim_key)?;
        victim.flags.set(SessionFlags::PRUNED);
        self.prunes += 1;
        debug!(prunes = self.prunes, "session pruned under capacity pressure");
        Some(victim)
    }

    /// Active session count
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sessions evicted under capacity pressure since the last reset
    pub fn prunes(&self) -> u64 {
        self.prunes
    }

    /// Zero the prune counter
    pub fn reset_prunes(&mut self) {
        self.prunes = 0;
    }
}
