//! Flow identification types for stateful inspection
//!
//! A flow is the bidirectional traffic aggregate between two endpoints over
//! one protocol. The key must compare equal regardless of which endpoint sent
//! first; the session cache is responsible for hashing normalized keys.

use crate::Timestamp;
use serde::Serialize;
use std::net::IpAddr;

/// IP protocol number for UDP
pub const IPPROTO_UDP: u8 = 17;

/// IP protocol number for TCP
pub const IPPROTO_TCP: u8 = 6;

/// One side of a flow: address + transport port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    /// IP address
    pub addr: IpAddr,
    /// Transport port (host byte order)
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint
    pub const fn new(addr: IpAddr, port: u16) -> Self {
        Self { addr, port }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// Canonical flow identifier: protocol plus both endpoints.
///
/// `canonical()` orders the endpoint pair so that A→B and B→A packets
/// produce an identical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    /// IP protocol number
    pub protocol: u8,
    /// Lower-ordered endpoint after canonicalization
    pub endpoint_a: Endpoint,
    /// Higher-ordered endpoint after canonicalization
    pub endpoint_b: Endpoint,
}

impl FlowKey {
    /// Build a canonical key from a packet's source and destination.
    #[inline]
    pub fn from_endpoints(protocol: u8, src: Endpoint, dst: Endpoint) -> Self {
        Self {
            protocol,
            endpoint_a: src,
            endpoint_b: dst,
        }
        .canonical()
    }

    /// Order the endpoint pair deterministically.
    #[inline]
    pub fn canonical(self) -> Self {
        if (self.endpoint_b.addr, self.endpoint_b.port) < (self.endpoint_a.addr, self.endpoint_a.port) {
            Self {
                protocol: self.protocol,
                endpoint_a: self.endpoint_b,
                endpoint_b: self.endpoint_a,
            }
        } else {
            self
        }
    }
}

/// Decoded UDP datagram metadata consumed by the session tracker.
///
/// Packet parsing happens upstream; this core only sees the endpoints and
/// the capture timestamp.
#[derive(Debug, Clone, Copy)]
pub struct UdpPacket {
    /// Sending endpoint of this datagram
    pub src: Endpoint,
    /// Receiving endpoint of this datagram
    pub dst: Endpoint,
    /// Capture timestamp
    pub timestamp: Timestamp,
}

impl UdpPacket {
    /// Create packet metadata
    pub const fn new(src: Endpoint, dst: Endpoint, timestamp: Timestamp) -> Self {
        Self { src, dst, timestamp }
    }

    /// Canonical flow key for this datagram
    #[inline]
    pub fn flow_key(&self) -> FlowKey {
        FlowKey::from_endpoints(IPPROTO_UDP, self.src, self.dst)
    }
}
