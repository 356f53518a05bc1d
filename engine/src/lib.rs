//! Flow-to-process correlation engine
//!
//! Attributes TCP lifecycle occurrences to the process that originated
//! the underlying flow. Connection-established occurrences fire in the
//! originating process context and carry their own identity; retransmit
//! and reset occurrences fire from kernel-internal work (timers,
//! softirq) that has lost it. The engine captures the identity at
//! connect time and re-attaches it later through a bounded flow cache.
//!
//! ## Architecture
//!
//! ```text
//! connect entry   -> record pending attempt in ConnectTracker
//!                    |
//!                    v
//! connect return  -> consume pending attempt; on success write
//!                    FlowMap[flow key] = pid
//!                    |
//!                    v
//! retransmit /    -> resolve flow key, look up FlowMap, build event,
//! reset           -> push onto the per-core EventChannel
//! ```
//!
//! Handlers follow the discipline of the instrumented environment: no
//! blocking, no unbounded loops, bounded-time completion, and no error
//! ever propagated out of an invocation.

pub mod cache;
pub mod channel;
pub mod handlers;
pub mod sock;
pub mod stats;
pub mod tracker;

pub use cache::FlowMap;
pub use channel::EventChannel;
pub use handlers::{CorrelationEngine, TaskContext};
pub use sock::{ProbeError, Sock};
pub use stats::{EngineStats, StatsSnapshot};
pub use tracker::ConnectTracker;

use flow_common::constants::{EVENT_QUEUE_CAPACITY, FLOW_MAP_MAX_ENTRIES};

/// Construction-time engine configuration.
///
/// All capacities are fixed once the engine is built.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Flow identity cache capacity (entries)
    pub flow_capacity: usize,
    /// Number of per-core event queues
    pub cores: usize,
    /// Capacity of each per-core event queue
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            flow_capacity: FLOW_MAP_MAX_ENTRIES,
            cores,
            queue_capacity: EVENT_QUEUE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_canonical_capacity() {
        let config = EngineConfig::default();
        assert_eq!(config.flow_capacity, 131072);
        assert!(config.cores >= 1);
        assert!(config.queue_capacity >= 1);
    }
}
