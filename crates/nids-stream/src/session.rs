//! Flow session record
//!
//! One `FlowSession` per tracked UDP flow, owned by the session cache. The
//! protocol payload is a tagged union selected by the session's protocol
//! tag; UDP payload slots come from the session pool and return to it
//! exactly once at teardown.

use nids_common::{Endpoint, FlowKey, Timestamp, UdpPacket};
use nids_policy::UdpPolicy;
use std::any::Any;
use std::sync::Arc;

/// Session state flags. Not mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct SessionFlags(u16);

impl SessionFlags {
    /// Traffic seen from the sender side
    pub const SEEN_SENDER: u16 = 1 << 0;
    /// Traffic seen from the responder side
    pub const SEEN_RESPONDER: u16 = 1 << 1;
    /// Both sides observed
    pub const ESTABLISHED: u16 = 1 << 2;
    /// Rule evaluation dropped the client side
    pub const DROP_CLIENT: u16 = 1 << 3;
    /// Rule evaluation dropped the server side
    pub const DROP_SERVER: u16 = 1 << 4;
    /// Idle past the policy timeout; terminal
    pub const TIMED_OUT: u16 = 1 << 5;
    /// Evicted under capacity pressure; terminal
    pub const PRUNED: u16 = 1 << 6;

    /// No flags set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check if any of `flags` is set
    #[inline(always)]
    pub const fn has(&self, flags: u16) -> bool {
        self.0 & flags != 0
    }

    /// Check if all of `flags` are set
    #[inline(always)]
    pub const fn has_all(&self, flags: u16) -> bool {
        self.0 & flags == flags
    }

    /// Set flags
    #[inline(always)]
    pub fn set(&mut self, flags: u16) {
        self.0 |= flags;
    }

    /// Raw bits
    #[inline(always)]
    pub const fn bits(&self) -> u16 {
        self.0
    }
}

/// Dirty markers consumed by a high-availability peer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct HaFlags(u8);

impl HaFlags {
    /// Session is new since the last sync
    pub const NEW: u8 = 1 << 0;
    /// Session changed since the last sync
    pub const MODIFIED: u8 = 1 << 1;
    /// Change is significant enough to force a sync
    pub const MAJOR_CHANGE: u8 = 1 << 2;

    /// No markers
    pub const fn empty() -> Self {
        Self(0)
    }

    /// All-dirty marker set applied before a timeout teardown
    pub const fn deletion_pending() -> Self {
        Self(Self::NEW | Self::MODIFIED | Self::MAJOR_CHANGE)
    }

    /// Check if marker is set
    #[inline(always)]
    pub const fn has(&self, flag: u8) -> bool {
        self.0 & flag != 0
    }
}

/// Which logical side of the flow sent the current packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The endpoint that sent the first observed packet
    FromSender,
    /// The opposite endpoint
    FromResponder,
}

/// Per-flow pass-through mask: packets arriving from a covered side are not
/// inspected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct IgnoreDirection(u8);

impl IgnoreDirection {
    /// Suppress packets sent by the sender side
    pub const SENDER: u8 = 1 << 0;
    /// Suppress packets sent by the responder side
    pub const RESPONDER: u8 = 1 << 1;
    /// Suppress both sides
    pub const BOTH: u8 = Self::SENDER | Self::RESPONDER;

    /// No pass-through
    pub const fn none() -> Self {
        Self(0)
    }

    /// Build from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::BOTH)
    }

    /// True when no direction is ignored
    #[inline(always)]
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Whether the mask covers a packet travelling in `dir`
    #[inline(always)]
    pub const fn covers(&self, dir: Direction) -> bool {
        match dir {
            Direction::FromSender => self.0 & Self::SENDER != 0,
            Direction::FromResponder => self.0 & Self::RESPONDER != 0,
        }
    }
}

/// UDP-specific per-flow record, pool-allocated
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpPayload {
    /// Capture time of the first packet of the tracked flow
    pub created: Timestamp,
}

/// Protocol payload, selected by the session's protocol tag
#[derive(Debug, Default)]
pub enum SessionPayload {
    /// No payload attached (stateless or torn down)
    #[default]
    None,
    /// UDP flow record
    Udp(UdpPayload),
}

impl SessionPayload {
    /// True when no payload is attached
    #[inline]
    pub const fn is_none(&self) -> bool {
        matches!(self, SessionPayload::None)
    }

    /// Detach the payload, leaving `None`
    #[inline]
    pub fn take(&mut self) -> SessionPayload {
        std::mem::take(self)
    }
}

/// One active (or recently active) flow.
#[derive(Debug)]
pub struct FlowSession {
    pub(crate) key: FlowKey,
    pub(crate) sender: Endpoint,
    pub(crate) responder: Endpoint,
    pub(crate) created: Timestamp,
    pub(crate) last_seen: Timestamp,
    /// 0 = unarmed
    pub(crate) expire_at: u64,
    pub(crate) protocol: u8,
    pub(crate) flags: SessionFlags,
    pub(crate) ignore: IgnoreDirection,
    pub(crate) direction: Direction,
    pub(crate) ha_flags: HaFlags,
    pub(crate) policy: Option<Arc<UdpPolicy>>,
    pub(crate) payload: SessionPayload,
    pub(crate) flowbits: u64,
    pub(crate) app_data: Option<Box<dyn Any + Send>>,
}

impl FlowSession {
    /// Fresh session for a key, as the cache creates it
    pub(crate) fn new(key: FlowKey, now: Timestamp) -> Self {
        Self {
            key,
            sender: key.endpoint_a,
            responder: key.endpoint_b,
            created: now,
            last_seen: now,
            expire_at: 0,
            protocol: key.protocol,
            flags: SessionFlags::empty(),
            ignore: IgnoreDirection::none(),
            direction: Direction::FromSender,
            ha_flags: HaFlags::empty(),
            policy: None,
            payload: SessionPayload::None,
            flowbits: 0,
            app_data: None,
        }
    }

    /// Flow key
    pub fn key(&self) -> &FlowKey {
        &self.key
    }

    /// Endpoint currently playing the sender role
    pub fn sender(&self) -> Endpoint {
        self.sender
    }

    /// Endpoint currently playing the responder role
    pub fn responder(&self) -> Endpoint {
        self.responder
    }

    /// State flags
    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    /// Set state flags (rule evaluation uses this for DROP_CLIENT/DROP_SERVER)
    pub fn set_flags(&mut self, flags: u16) {
        self.flags.set(flags);
    }

    /// Pass-through mask
    pub fn ignore_direction(&self) -> IgnoreDirection {
        self.ignore
    }

    /// Coarse direction label
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// HA dirty markers
    pub fn ha_flags(&self) -> HaFlags {
        self.ha_flags
    }

    /// Resolved policy, if cached on the session
    pub fn policy(&self) -> Option<&Arc<UdpPolicy>> {
        self.policy.as_ref()
    }

    /// Expiry deadline in seconds since epoch; 0 when unarmed
    pub fn expire_at(&self) -> u64 {
        self.expire_at
    }

    /// Opaque flow-bit storage for rule evaluation
    pub fn flowbits(&self) -> u64 {
        self.flowbits
    }

    /// Set flow-bit storage
    pub fn set_flowbits(&mut self, bits: u64) {
        self.flowbits = bits;
    }

    /// Attach application-layer side data
    pub fn set_app_data(&mut self, data: Box<dyn Any + Send>) {
        self.app_data = Some(data);
    }

    /// Application-layer side data, if the stored value is a `T`
    pub fn app_data<T: 'static>(&self) -> Option<&T> {
        self.app_data.as_ref()?.downcast_ref()
    }

    /// Re-arm the expiry deadline from a packet timestamp
    #[inline]
    pub(crate) fn arm_expiry(&mut self, now: Timestamp, timeout_secs: u64) {
        self.expire_at = now.as_secs() + timeout_secs;
        self.last_seen = now;
    }

    /// Whether the deadline has passed; unarmed sessions never expire
    #[inline]
    pub(crate) fn is_expired(&self, now: Timestamp) -> bool {
        self.expire_at != 0 && now.as_secs() > self.expire_at
    }

    /// Which side of the flow sent this packet.
    ///
    /// Packets reach a session only through its key, so the source always
    /// matches one recorded endpoint; the sender side wins a tie.
    #[inline]
    pub fn packet_direction(&self, pkt: &UdpPacket) -> Direction {
        if pkt.src == self.sender {
            Direction::FromSender
        } else if pkt.src == self.responder {
            Direction::FromResponder
        } else {
            Direction::FromSender
        }
    }

    /// Reconcile an externally supplied direction claim.
    ///
    /// When the claim already matches the recorded orientation this is a
    /// no-op; otherwise the sender/responder endpoint roles are swapped. The
    /// coarse direction label is left unchanged either way.
    pub fn update_direction(&mut self, claimed: Direction, endpoint: Endpoint) {
        if endpoint == self.sender {
            if claimed == Direction::FromSender && self.direction == Direction::FromSender {
                return;
            }
        } else if endpoint == self.responder
            && claimed == Direction::FromResponder
            && self.direction == Direction::FromResponder
        {
            return;
        }

        std::mem::swap(&mut self.sender, &mut self.responder);
    }
}
