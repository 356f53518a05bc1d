//! Probe state tracker for in-flight connect attempts
//!
//! A connect call is observed twice: once on entry, where the socket is
//! known but the outcome is not, and once on return, where the outcome
//! is known but the socket argument is gone. The tracker bridges the
//! two with a transient per-thread record, deleted unconditionally by
//! the matching return.

use dashmap::DashMap;
use flow_common::constants::PENDING_CONNECT_MAX_ENTRIES;
use log::trace;

use crate::sock::Sock;

/// Transient map of thread id to the socket of an in-flight connect.
///
/// At most one record per thread id exists at a time by construction
/// (the same thread cannot be inside two connect calls); a second entry
/// for a thread that never saw its return simply overwrites the first.
pub struct ConnectTracker {
    pending: DashMap<u32, Sock>,
    capacity: usize,
}

impl ConnectTracker {
    pub fn new() -> Self {
        Self::with_capacity(PENDING_CONNECT_MAX_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a connect attempt entering for `tid`. Last write wins.
    ///
    /// Under capacity pressure new records are dropped; the matching
    /// return then observes an orphan, which the return path treats as
    /// a no-op.
    pub fn record_entry(&self, tid: u32, sock: Sock) {
        if self.pending.len() >= self.capacity && !self.pending.contains_key(&tid) {
            trace!("pending connect table full, dropping entry for tid {tid}");
            return;
        }
        self.pending.insert(tid, sock);
    }

    /// Consume the pending record for `tid`, regardless of how the
    /// connect call came back. `None` means no entry was ever observed
    /// for this thread, which is expected and harmless.
    pub fn take_return(&self, tid: u32) -> Option<Sock> {
        self.pending.remove(&tid).map(|(_, sock)| sock)
    }

    /// Number of attempts currently in flight
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for ConnectTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sock(dport: u16) -> Sock {
        Sock::v4(1, [10, 0, 0, 1], [10, 0, 0, 2], 40000, dport)
    }

    #[test]
    fn entry_is_consumed_by_return() {
        let tracker = ConnectTracker::new();
        tracker.record_entry(10, sock(80));

        assert_eq!(tracker.take_return(10), Some(sock(80)));
        // Removed unconditionally, a second return sees nothing
        assert_eq!(tracker.take_return(10), None);
    }

    #[test]
    fn orphan_return_is_a_noop() {
        let tracker = ConnectTracker::new();
        assert_eq!(tracker.take_return(99), None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn second_entry_for_same_thread_overwrites() {
        let tracker = ConnectTracker::new();
        tracker.record_entry(10, sock(80));
        tracker.record_entry(10, sock(443));

        assert_eq!(tracker.take_return(10), Some(sock(443)));
    }

    #[test]
    fn entries_are_dropped_under_capacity_pressure() {
        let tracker = ConnectTracker::with_capacity(2);
        tracker.record_entry(1, sock(80));
        tracker.record_entry(2, sock(81));
        tracker.record_entry(3, sock(82));

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.take_return(3), None);
        // Existing tids can still be overwritten at capacity
        tracker.record_entry(1, sock(443));
        assert_eq!(tracker.take_return(1), Some(sock(443)));
    }
}
