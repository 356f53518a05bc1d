//! Cross-boundary event channel
//!
//! Models the per-CPU buffers that carry finished event records out of
//! the engine: one fixed-capacity lock-free ring per execution core,
//! written by local producers and drained by a single external
//! consumer. Delivery is best effort; a full ring or a missing
//! consumer drops the record silently and no backpressure ever reaches
//! a producer.

use crossbeam_queue::ArrayQueue;
use flow_common::types::TcpEvent;
use log::trace;

/// Per-core bounded queues of finished event records
pub struct EventChannel {
    queues: Vec<ArrayQueue<TcpEvent>>,
}

impl EventChannel {
    /// Create one ring of `queue_capacity` records per core.
    ///
    /// Zero cores or zero capacity are clamped to one.
    pub fn new(cores: usize, queue_capacity: usize) -> Self {
        let cores = cores.max(1);
        let queue_capacity = queue_capacity.max(1);
        Self {
            queues: (0..cores).map(|_| ArrayQueue::new(queue_capacity)).collect(),
        }
    }

    /// Number of per-core queues
    pub fn cores(&self) -> usize {
        self.queues.len()
    }

    /// Push a record onto the queue for `cpu`. Never blocks.
    ///
    /// Returns `false` when the record was dropped, either because the
    /// queue is full or because `cpu` does not map to a queue. The
    /// producer gets no other signal.
    pub fn push(&self, cpu: usize, event: TcpEvent) -> bool {
        let Some(queue) = self.queues.get(cpu) else {
            trace!("no event queue for cpu {cpu}, dropping record");
            return false;
        };
        if queue.push(event).is_err() {
            trace!("event queue for cpu {cpu} full, dropping record");
            return false;
        }
        true
    }

    /// Pop one record from the queue for `cpu`, consumer side
    pub fn pop(&self, cpu: usize) -> Option<TcpEvent> {
        self.queues.get(cpu)?.pop()
    }

    /// Drain every queue into a single batch, consumer side.
    ///
    /// Ordering is per queue only; no order is promised across cores.
    pub fn drain_all(&self) -> Vec<TcpEvent> {
        let mut batch = Vec::new();
        for queue in &self.queues {
            while let Some(event) = queue.pop() {
                batch.push(event);
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_common::constants::{AF_INET, EVENT_TYPE_CONNECT};

    fn event(pid: u32) -> TcpEvent {
        TcpEvent {
            timestamp: 0,
            pid,
            state: 0,
            event_type: EVENT_TYPE_CONNECT,
            netns: 1,
            sport: 40000,
            dport: 80,
            family: AF_INET,
            saddr: [10, 0, 0, 1],
            daddr: [10, 0, 0, 2],
            saddr_v6: [0; 16],
            daddr_v6: [0; 16],
            _pad: [0; 2],
        }
    }

    #[test]
    fn push_and_pop_per_core() {
        let channel = EventChannel::new(2, 4);
        assert!(channel.push(0, event(1)));
        assert!(channel.push(1, event(2)));

        assert_eq!(channel.pop(0).map(|e| e.pid), Some(1));
        assert_eq!(channel.pop(1).map(|e| e.pid), Some(2));
        assert_eq!(channel.pop(0), None);
    }

    #[test]
    fn full_queue_drops_silently() {
        let channel = EventChannel::new(1, 2);
        assert!(channel.push(0, event(1)));
        assert!(channel.push(0, event(2)));
        assert!(!channel.push(0, event(3)));

        let drained = channel.drain_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].pid, 1);
        assert_eq!(drained[1].pid, 2);
    }

    #[test]
    fn out_of_range_core_drops() {
        let channel = EventChannel::new(2, 4);
        assert!(!channel.push(5, event(1)));
        assert!(channel.drain_all().is_empty());
    }

    #[test]
    fn degenerate_sizes_are_clamped() {
        let channel = EventChannel::new(0, 0);
        assert_eq!(channel.cores(), 1);
        assert!(channel.push(0, event(1)));
        assert!(!channel.push(0, event(2)));
    }
}
