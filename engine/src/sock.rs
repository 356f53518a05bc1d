//! Socket identity resolution
//!
//! Models the information read out of a kernel socket at a trigger
//! point: namespace, family, addresses, and ports. Resolution into a
//! canonical `FlowKey` is the seam where the address-family policy is
//! enforced: the correlation path only resolves IPv4 tuples.

use flow_common::constants::{AF_INET, AF_INET6};
use flow_common::types::{Address, FlowKey};
use thiserror::Error;

/// Why a single handler invocation was abandoned.
///
/// These are scope boundaries and expected races, not faults; the
/// engine never propagates them past the invocation that hit them.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// The trigger reported a family the correlation path does not
    /// resolve
    #[error("unsupported address family {0}")]
    UnsupportedFamily(u16),
    /// The family tag disagrees with the address variants in the tuple
    #[error("address variants do not match family tag {0}")]
    FamilyMismatch(u16),
}

/// Socket identity as observed at a trigger point.
///
/// One side of a TCP flow: namespace, family tag, both endpoint
/// addresses, and both ports in host byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sock {
    /// Network namespace inode number
    pub netns: u32,
    /// Address family reported by the trigger
    pub family: u16,
    /// Local address
    pub saddr: Address,
    /// Remote address
    pub daddr: Address,
    /// Local port, host byte order
    pub sport: u16,
    /// Remote port, host byte order
    pub dport: u16,
}

impl Sock {
    /// Build an IPv4 socket identity from raw address octets
    pub fn v4(netns: u32, saddr: [u8; 4], daddr: [u8; 4], sport: u16, dport: u16) -> Self {
        Self {
            netns,
            family: AF_INET,
            saddr: Address::V4(saddr),
            daddr: Address::V4(daddr),
            sport,
            dport,
        }
    }

    /// Build an IPv6 socket identity from raw address octets
    pub fn v6(netns: u32, saddr: [u8; 16], daddr: [u8; 16], sport: u16, dport: u16) -> Self {
        Self {
            netns,
            family: AF_INET6,
            saddr: Address::V6(saddr),
            daddr: Address::V6(daddr),
            sport,
            dport,
        }
    }

    /// Resolve this socket into the canonical flow key.
    ///
    /// Only the 4-byte family resolves; any other family aborts the
    /// invocation that asked.
    pub fn flow_key(&self) -> Result<FlowKey, ProbeError> {
        if self.family != AF_INET {
            return Err(ProbeError::UnsupportedFamily(self.family));
        }
        match (self.saddr, self.daddr) {
            (Address::V4(_), Address::V4(_)) => Ok(FlowKey {
                netns: self.netns,
                saddr: self.saddr,
                daddr: self.daddr,
                sport: self.sport,
                dport: self.dport,
            }),
            _ => Err(ProbeError::FamilyMismatch(self.family)),
        }
    }
}
