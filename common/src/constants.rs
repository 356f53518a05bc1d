//! Shared constants for the correlation engine
//!
//! These constants are used by both the engine and its consumer to
//! ensure consistency in limits and wire-level encodings.

// ============================================================================
// Capacity Limits
// ============================================================================

/// Maximum number of flow attributions held in the flow identity cache.
///
/// Matches the sizing of an LRU hash keyed by flow 4-tuple plus netns:
/// up to 128k concurrently attributed flows.
pub const FLOW_MAP_MAX_ENTRIES: usize = 131072;

/// Maximum number of in-flight connect attempts tracked at once
pub const PENDING_CONNECT_MAX_ENTRIES: usize = 10240;

/// Default per-core event queue capacity
pub const EVENT_QUEUE_CAPACITY: usize = 4096;

// ============================================================================
// Address Families (from linux/socket.h)
// ============================================================================

/// IPv4 address family
pub const AF_INET: u16 = 2;

/// IPv6 address family
pub const AF_INET6: u16 = 10;

// ============================================================================
// Event Types (for TcpEvent.event_type)
// ============================================================================

/// Connection established in the originating process context
pub const EVENT_TYPE_CONNECT: u32 = 0;

/// Segment retransmitted, potentially from an unrelated context
pub const EVENT_TYPE_RETRANSMIT: u32 = 1;

/// Reset sent by the local stack
pub const EVENT_TYPE_SEND_RESET: u32 = 2;

/// Reset received from the peer
pub const EVENT_TYPE_RECV_RESET: u32 = 3;

// ============================================================================
// Process Attribution
// ============================================================================

/// Attribution value when no flow owner is known
pub const PID_UNKNOWN: u32 = 0;

// ============================================================================
// TCP States (from net/tcp_states.h)
// ============================================================================

pub const TCP_ESTABLISHED: i32 = 1;
pub const TCP_SYN_SENT: i32 = 2;
pub const TCP_SYN_RECV: i32 = 3;
pub const TCP_FIN_WAIT1: i32 = 4;
pub const TCP_FIN_WAIT2: i32 = 5;
pub const TCP_TIME_WAIT: i32 = 6;
pub const TCP_CLOSE: i32 = 7;
pub const TCP_CLOSE_WAIT: i32 = 8;
pub const TCP_LAST_ACK: i32 = 9;
pub const TCP_LISTEN: i32 = 10;
pub const TCP_CLOSING: i32 = 11;
pub const TCP_NEW_SYN_RECV: i32 = 12;

/// Human-readable label for a TCP state, for consumer display surfaces.
///
/// Unrecognized states map to `"unknown"` rather than failing.
pub fn tcp_state_name(state: i32) -> &'static str {
    match state {
        TCP_ESTABLISHED => "established",
        TCP_SYN_SENT => "syn_sent",
        TCP_SYN_RECV => "syn_recv",
        TCP_FIN_WAIT1 => "fin_wait_1",
        TCP_FIN_WAIT2 => "fin_wait_2",
        TCP_TIME_WAIT => "time_wait",
        TCP_CLOSE => "close",
        TCP_CLOSE_WAIT => "close_wait",
        TCP_LAST_ACK => "last_ack",
        TCP_LISTEN => "listen",
        TCP_CLOSING => "closing",
        TCP_NEW_SYN_RECV => "new_syn_recv",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_states_have_labels() {
        assert_eq!(tcp_state_name(TCP_ESTABLISHED), "established");
        assert_eq!(tcp_state_name(TCP_SYN_SENT), "syn_sent");
        assert_eq!(tcp_state_name(TCP_TIME_WAIT), "time_wait");
    }

    #[test]
    fn unrecognized_state_is_unknown() {
        assert_eq!(tcp_state_name(0), "unknown");
        assert_eq!(tcp_state_name(13), "unknown");
        assert_eq!(tcp_state_name(-1), "unknown");
    }
}
