//! Capability interfaces injected into the tracker
//!
//! The expected-session registry and the high-availability peer are external
//! state machines; this core only calls into them at fixed points.

use crate::session::{FlowSession, IgnoreDirection};
use nids_common::UdpPacket;

/// Out-of-band pre-registration of future flows (control/data channel
/// pairing). Consulted before the port-filter gate can discard a packet, and
/// again right after payload initialization to decide pass-through.
pub trait ExpectedSessionRegistry {
    /// Whether this packet matches a pending registration
    fn is_expected(&mut self, pkt: &UdpPacket) -> bool;

    /// Consume the registration for a newly-created session and report which
    /// directions should be passed through uninspected.
    fn claim(&mut self, pkt: &UdpPacket, session: &mut FlowSession) -> IgnoreDirection;
}

/// Hook points toward a high-availability peer. The wire protocol is out of
/// scope; only the notification ordering matters here.
pub trait HaReplicator {
    /// Called before a timeout-triggered teardown mutates the session
    fn notify_deletion(&mut self, session: &FlowSession);
}

/// Registry with no pending expectations
#[derive(Debug, Default)]
pub struct NoExpectedSessions;

impl ExpectedSessionRegistry for NoExpectedSessions {
    fn is_expected(&mut self, _pkt: &UdpPacket) -> bool {
        false
    }

    fn claim(&mut self, _pkt: &UdpPacket, _session: &mut FlowSession) -> IgnoreDirection {
        IgnoreDirection::none()
    }
}

/// Standalone deployment: no peer to notify
#[derive(Debug, Default)]
pub struct NoHaPeer;

impl HaReplicator for NoHaPeer {
    fn notify_deletion(&mut self, _session: &FlowSession) {}
}
