//! Per-port filter bitmask
//!
//! Decides, before any session memory is committed, whether unsolicited
//! traffic on a port pair should be tracked or discarded. Rule loading marks
//! the ports it references; `verify()` on the owning config derives the
//! ignore-any behavior from the default policy.

use serde::Serialize;

/// Rules reference this port; packets must be inspected
pub const PORT_INSPECT: u16 = 1 << 0;

/// Session tracking is required on this port
pub const PORT_SESSION: u16 = 1 << 1;

/// Outcome of the pre-session port check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PortAction {
    /// Track and inspect the packet
    Inspect,
    /// Ignore the packet; no session is created
    Discard,
}

/// Filter-status bitmask over the full port range.
#[derive(Clone)]
pub struct PortFilterTable {
    bits: Box<[u16; 65536]>,
    ignore_any: bool,
}

impl Default for PortFilterTable {
    fn default() -> Self {
        Self {
            bits: Box::new([0u16; 65536]),
            ignore_any: false,
        }
    }
}

impl std::fmt::Debug for PortFilterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let monitored = self.bits.iter().filter(|b| **b != 0).count();
        f.debug_struct("PortFilterTable")
            .field("monitored_ports", &monitored)
            .field("ignore_any", &self.ignore_any)
            .finish()
    }
}

impl PortFilterTable {
    /// Set status bits for a port
    #[inline]
    pub fn set(&mut self, port: u16, status: u16) {
        self.bits[port as usize] |= status;
    }

    /// Clear status bits for a port
    #[inline]
    pub fn unset(&mut self, port: u16, status: u16) {
        self.bits[port as usize] &= !status;
    }

    /// Read status bits for a port
    #[inline]
    pub fn get(&self, port: u16) -> u16 {
        self.bits[port as usize]
    }

    /// Derived from the default policy's ignore-any flag at verify time
    pub fn set_ignore_any(&mut self, ignore_any: bool) {
        self.ignore_any = ignore_any;
    }

    /// Whether unmonitored ports are discarded
    pub fn ignore_any(&self) -> bool {
        self.ignore_any
    }

    /// Pre-session gate for a packet's port pair.
    ///
    /// A packet is discarded only when neither port is monitored by any rule
    /// and the default policy asked to ignore unbound any→any rules.
    #[inline]
    pub fn decision(&self, src_port: u16, dst_port: u16) -> PortAction {
        if self.get(src_port) != 0 || self.get(dst_port) != 0 {
            return PortAction::Inspect;
        }
        if self.ignore_any {
            PortAction::Discard
        } else {
            PortAction::Inspect
        }
    }
}
