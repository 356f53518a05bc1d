//! Engine health counters
//!
//! Lock-free counters over the engine's trigger paths, the moral
//! equivalent of a probe's stats map. Counters are monotonic and
//! updated with relaxed ordering; a snapshot is a best-effort reading,
//! which is all a health surface needs.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::sock::ProbeError;

/// Monotonic counters for every trigger and failure path
#[derive(Default)]
pub struct EngineStats {
    pub connect_entries: AtomicU64,
    pub connect_returns: AtomicU64,
    pub orphan_returns: AtomicU64,
    pub failed_connects: AtomicU64,
    pub attributions_written: AtomicU64,
    pub cache_evictions: AtomicU64,
    pub connects: AtomicU64,
    pub retransmits: AtomicU64,
    pub resets: AtomicU64,
    pub events_emitted: AtomicU64,
    pub events_dropped: AtomicU64,
    pub unsupported_family: AtomicU64,
}

/// Point-in-time reading of the engine counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub connect_entries: u64,
    pub connect_returns: u64,
    pub orphan_returns: u64,
    pub failed_connects: u64,
    pub attributions_written: u64,
    pub cache_evictions: u64,
    pub connects: u64,
    pub retransmits: u64,
    pub resets: u64,
    pub events_emitted: u64,
    pub events_dropped: u64,
    pub unsupported_family: u64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an abandoned invocation by its cause
    pub(crate) fn note_skip(&self, error: &ProbeError) {
        match error {
            ProbeError::UnsupportedFamily(_) | ProbeError::FamilyMismatch(_) => {
                Self::bump(&self.unsupported_family);
            }
        }
    }

    /// Best-effort reading of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let read = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            connect_entries: read(&self.connect_entries),
            connect_returns: read(&self.connect_returns),
            orphan_returns: read(&self.orphan_returns),
            failed_connects: read(&self.failed_connects),
            attributions_written: read(&self.attributions_written),
            cache_evictions: read(&self.cache_evictions),
            connects: read(&self.connects),
            retransmits: read(&self.retransmits),
            resets: read(&self.resets),
            events_emitted: read(&self.events_emitted),
            events_dropped: read(&self.events_dropped),
            unsupported_family: read(&self.unsupported_family),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_common::constants::AF_INET6;

    #[test]
    fn snapshot_reflects_bumps() {
        let stats = EngineStats::new();
        EngineStats::bump(&stats.retransmits);
        EngineStats::bump(&stats.retransmits);
        stats.note_skip(&ProbeError::UnsupportedFamily(AF_INET6));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.retransmits, 2);
        assert_eq!(snapshot.unsupported_family, 1);
        assert_eq!(snapshot.events_emitted, 0);
    }
}
