//! Shared data structures between the correlation engine and its consumer
//!
//! `TcpEvent` is repr(C) with an explicit field order so that its byte
//! image is stable across the engine boundary. `FlowKey` and `Address`
//! are model types: the address is a tagged variant discriminated by
//! family, and flow key equality and hashing are defined over the full
//! variant so a future V6 correlation path inherits consistent key
//! semantics.

use core::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::constants::{AF_INET, AF_INET6};

/// One endpoint address, tagged by family.
///
/// The canonical correlation path only resolves the `V4` variant; `V6`
/// exists so events and keys can carry 16-byte addresses without a
/// second parallel schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "userspace", derive(serde::Serialize))]
pub enum Address {
    /// IPv4 address, network byte order
    V4([u8; 4]),
    /// IPv6 address, network byte order
    V6([u8; 16]),
}

impl Address {
    /// Address family tag for this variant
    pub fn family(&self) -> u16 {
        match self {
            Address::V4(_) => AF_INET,
            Address::V6(_) => AF_INET6,
        }
    }

    /// Convert to a standard library address for display surfaces
    pub fn ip(&self) -> IpAddr {
        match self {
            Address::V4(octets) => IpAddr::V4(Ipv4Addr::from(*octets)),
            Address::V6(octets) => IpAddr::V6(Ipv6Addr::from(*octets)),
        }
    }
}

impl From<Ipv4Addr> for Address {
    fn from(addr: Ipv4Addr) -> Self {
        Address::V4(addr.octets())
    }
}

impl From<Ipv6Addr> for Address {
    fn from(addr: Ipv6Addr) -> Self {
        Address::V6(addr.octets())
    }
}

/// Canonical identifier of one side of a TCP flow within a namespace.
///
/// At any instant at most one live attribution exists per key; a later
/// flow reusing the key simply overwrites the prior attribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "userspace", derive(serde::Serialize))]
pub struct FlowKey {
    /// Network namespace inode number
    pub netns: u32,
    /// Source address
    pub saddr: Address,
    /// Destination address
    pub daddr: Address,
    /// Source port, host byte order
    pub sport: u16,
    /// Destination port, host byte order
    pub dport: u16,
}

/// Kind of connection lifecycle occurrence carried by a `TcpEvent`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "userspace", derive(serde::Serialize))]
pub enum EventType {
    /// Connection established in the originating process context
    Connect = 0,
    /// Segment retransmitted
    Retransmit = 1,
    /// Reset sent by the local stack
    SendReset = 2,
    /// Reset received from the peer
    RecvReset = 3,
}

impl EventType {
    /// Wire encoding for `TcpEvent.event_type`
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Decode from the wire encoding
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(EventType::Connect),
            1 => Some(EventType::Retransmit),
            2 => Some(EventType::SendReset),
            3 => Some(EventType::RecvReset),
            _ => None,
        }
    }
}

/// Fixed-layout TCP lifecycle event record.
///
/// Built once per occurrence and never mutated after emission. Both the
/// 4-byte and 16-byte address fields are always present; `family` tags
/// which pair is meaningful.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "userspace", derive(serde::Serialize))]
pub struct TcpEvent {
    /// Monotonic timestamp at event construction (nanoseconds)
    pub timestamp: u64,
    /// Attributed process id, `PID_UNKNOWN` when unresolved
    pub pid: u32,
    /// TCP state reported by the trigger, 0 when not meaningful
    pub state: i32,
    /// Event type (see `EVENT_TYPE_*`)
    pub event_type: u32,
    /// Network namespace inode number
    pub netns: u32,
    /// Source port, host byte order
    pub sport: u16,
    /// Destination port, host byte order
    pub dport: u16,
    /// Address family (`AF_INET` or `AF_INET6`)
    pub family: u16,
    /// IPv4 source address, valid when family is `AF_INET`
    pub saddr: [u8; 4],
    /// IPv4 destination address, valid when family is `AF_INET`
    pub daddr: [u8; 4],
    /// IPv6 source address, valid when family is `AF_INET6`
    pub saddr_v6: [u8; 16],
    /// IPv6 destination address, valid when family is `AF_INET6`
    pub daddr_v6: [u8; 16],
    /// Explicit trailing padding so the full byte image is defined
    pub _pad: [u8; 2],
}

impl TcpEvent {
    /// Source address of the flow, according to the family tag
    pub fn source_ip(&self) -> Option<IpAddr> {
        match self.family {
            AF_INET => Some(IpAddr::V4(Ipv4Addr::from(self.saddr))),
            AF_INET6 => Some(IpAddr::V6(Ipv6Addr::from(self.saddr_v6))),
            _ => None,
        }
    }

    /// Destination address of the flow, according to the family tag
    pub fn destination_ip(&self) -> Option<IpAddr> {
        match self.family {
            AF_INET => Some(IpAddr::V4(Ipv4Addr::from(self.daddr))),
            AF_INET6 => Some(IpAddr::V6(Ipv6Addr::from(self.daddr_v6))),
            _ => None,
        }
    }

    /// Byte image of the record, for the channel's wire surface
    pub fn as_bytes(&self) -> &[u8] {
        // repr(C) with explicit trailing padding: every byte is initialized
        unsafe {
            core::slice::from_raw_parts(
                self as *const TcpEvent as *const u8,
                core::mem::size_of::<TcpEvent>(),
            )
        }
    }

    /// Decode a record from its byte image.
    ///
    /// Returns `None` when the buffer is shorter than one record.
    /// Trailing bytes beyond one record are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Option<TcpEvent> {
        if bytes.len() < core::mem::size_of::<TcpEvent>() {
            return None;
        }
        let event = unsafe { (bytes.as_ptr() as *const TcpEvent).read_unaligned() };
        Some(event)
    }
}

// Compile-time layout checks
// These will fail to compile if the wire layout drifts
const _: () = {
    assert!(core::mem::size_of::<TcpEvent>() == 72);
    assert!(core::mem::size_of::<TcpEvent>() % core::mem::align_of::<TcpEvent>() == 0);
};
