//! Session payload pool
//!
//! Fixed-capacity allocator for per-session UDP records, sized to the
//! session cache capacity at init. Exhaustion is a counted, recoverable
//! condition: the packet is processed stateless, never dropped.

use crate::session::UdpPayload;
use nids_common::{ConfigError, ConfigResult};

/// Pre-allocated pool of `UdpPayload` slots.
///
/// Callers must release each acquired payload exactly once; the pool does
/// not detect double release.
#[derive(Debug)]
pub struct SessionPool {
    free: Vec<UdpPayload>,
    capacity: usize,
    in_use: usize,
}

impl SessionPool {
    /// Pre-allocate `capacity` payload slots
    pub fn with_capacity(capacity: usize) -> ConfigResult<Self> {
        if capacity == 0 {
            return Err(ConfigError::PoolInit(
                "pool capacity must be non-zero".into(),
            ));
        }
        Ok(Self {
            free: vec![UdpPayload::default(); capacity],
            capacity,
            in_use: 0,
        })
    }

    /// Take a slot; `None` when the pool is exhausted. Never blocks.
    #[inline]
    pub fn acquire(&mut self) -> Option<UdpPayload> {
        let payload = self.free.pop()?;
        self.in_use += 1;
        Some(payload)
    }

    /// Return a slot to the free set
    #[inline]
    pub fn release(&mut self, payload: UdpPayload) {
        debug_assert!(self.in_use > 0, "release without matching acquire");
        if self.free.len() < self.capacity {
            self.free.push(payload);
        }
        self.in_use = self.in_use.saturating_sub(1);
    }

    /// Return every slot to the free set (engine flush)
    pub fn reset_all(&mut self) {
        self.free.clear();
        self.free.resize(self.capacity, UdpPayload::default());
        self.in_use = 0;
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently handed out
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Slots available
    pub fn available(&self) -> usize {
        self.free.len()
    }
}
