//! Event attribution handlers
//!
//! One entry point per trigger, wired to the shared tracker, cache,
//! and channel. Handlers are independent and stateless beyond those:
//! each invocation runs to completion, touches the cache at most once,
//! emits at most one event, and swallows its own failures. Nothing a
//! handler does may block, loop without bound, or crash the engine.

use flow_common::constants::{AF_INET, AF_INET6, PID_UNKNOWN};
use flow_common::types::{Address, EventType, TcpEvent};
use log::trace;

use crate::cache::FlowMap;
use crate::channel::EventChannel;
use crate::sock::{ProbeError, Sock};
use crate::stats::EngineStats;
use crate::tracker::ConnectTracker;
use crate::EngineConfig;

/// Identity of the execution context a trigger fired in.
///
/// For synchronous triggers `pid`/`tid` name the originating process;
/// for asynchronous ones (retransmit, resets) they name whatever
/// kernel-internal work happened to run, which is why those paths
/// attribute through the cache instead.
#[derive(Clone, Copy, Debug)]
pub struct TaskContext {
    /// Process id of the current context
    pub pid: u32,
    /// Thread id of the current context
    pub tid: u32,
    /// Execution core the trigger fired on
    pub cpu: usize,
}

/// The correlation engine: probe state tracker, flow identity cache,
/// per-core event channel, and health counters behind one facade.
pub struct CorrelationEngine {
    pending: ConnectTracker,
    flows: FlowMap,
    channel: EventChannel,
    stats: EngineStats,
}

impl CorrelationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            pending: ConnectTracker::new(),
            flows: FlowMap::with_capacity(config.flow_capacity),
            channel: EventChannel::new(config.cores, config.queue_capacity),
            stats: EngineStats::new(),
        }
    }

    /// Engine with the canonical defaults (128k flows, one queue per
    /// available core)
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Connect-attempt entry trigger.
    ///
    /// Fires in the originating thread before the outcome is known;
    /// records the socket so the return trigger can find it. Emits
    /// nothing.
    pub fn connect_entry(&self, task: &TaskContext, sock: Sock) {
        EngineStats::bump(&self.stats.connect_entries);
        self.pending.record_entry(task.tid, sock);
    }

    /// Connect-attempt return trigger.
    ///
    /// Always consumes the pending record for the thread. Only a
    /// successful return (`status == 0`) writes an attribution; a
    /// failed connect never claims a flow identity. Emits nothing on
    /// either path.
    pub fn connect_return(&self, task: &TaskContext, status: i32) {
        EngineStats::bump(&self.stats.connect_returns);

        let Some(sock) = self.pending.take_return(task.tid) else {
            // Entry never observed: predates the engine, or was shed
            // under capacity pressure
            EngineStats::bump(&self.stats.orphan_returns);
            return;
        };

        if status != 0 {
            EngineStats::bump(&self.stats.failed_connects);
            return;
        }

        match sock.flow_key() {
            Ok(key) => {
                if self.flows.insert(key, task.pid) {
                    EngineStats::bump(&self.stats.cache_evictions);
                }
                EngineStats::bump(&self.stats.attributions_written);
            }
            Err(err) => {
                self.stats.note_skip(&err);
                trace!("connect return for tid {} not attributable: {err}", task.tid);
            }
        }
    }

    /// Connect-established trigger.
    ///
    /// Fires synchronously in the originating process, so the pid comes
    /// straight from the current context and no cache lookup happens.
    /// The TCP state field is not meaningful for this occurrence.
    pub fn connect_established(&self, task: &TaskContext, sock: &Sock) {
        EngineStats::bump(&self.stats.connects);

        if sock.family != AF_INET && sock.family != AF_INET6 {
            self.stats.note_skip(&ProbeError::UnsupportedFamily(sock.family));
            return;
        }

        let event = build_event(EventType::Connect, task.pid, 0, sock);
        self.emit(task.cpu, event);
    }

    /// Retransmission trigger.
    ///
    /// Fires from a context that may have nothing to do with the flow's
    /// owner; attribution goes through the cache, falling back to the
    /// explicit unknown pid on a miss. The event is emitted regardless
    /// of attribution success.
    pub fn retransmit(&self, task: &TaskContext, sock: &Sock, state: i32) {
        EngineStats::bump(&self.stats.retransmits);
        if let Err(err) = self.try_attributed_event(task, sock, state, EventType::Retransmit) {
            self.stats.note_skip(&err);
            trace!("retransmit invocation abandoned: {err}");
        }
    }

    /// Reset-sent trigger; attributes like a retransmission
    pub fn send_reset(&self, task: &TaskContext, sock: &Sock, state: i32) {
        EngineStats::bump(&self.stats.resets);
        if let Err(err) = self.try_attributed_event(task, sock, state, EventType::SendReset) {
            self.stats.note_skip(&err);
            trace!("send reset invocation abandoned: {err}");
        }
    }

    /// Reset-received trigger; attributes like a retransmission
    pub fn recv_reset(&self, task: &TaskContext, sock: &Sock, state: i32) {
        EngineStats::bump(&self.stats.resets);
        if let Err(err) = self.try_attributed_event(task, sock, state, EventType::RecvReset) {
            self.stats.note_skip(&err);
            trace!("recv reset invocation abandoned: {err}");
        }
    }

    fn try_attributed_event(
        &self,
        task: &TaskContext,
        sock: &Sock,
        state: i32,
        event_type: EventType,
    ) -> Result<(), ProbeError> {
        // The current context's pid is deliberately not used here
        let key = sock.flow_key()?;
        let pid = self.flows.lookup(&key).unwrap_or(PID_UNKNOWN);

        let event = build_event(event_type, pid, state, sock);
        self.emit(task.cpu, event);
        Ok(())
    }

    fn emit(&self, cpu: usize, event: TcpEvent) {
        if self.channel.push(cpu, event) {
            EngineStats::bump(&self.stats.events_emitted);
        } else {
            EngineStats::bump(&self.stats.events_dropped);
        }
    }

    /// Flow identity cache, shared across all handlers
    pub fn flows(&self) -> &FlowMap {
        &self.flows
    }

    /// Pending connect tracker
    pub fn pending(&self) -> &ConnectTracker {
        &self.pending
    }

    /// Consumer side of the event channel
    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    /// Health counters
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}

/// Build the immutable event record for one occurrence, filling the
/// address fields that match the socket's family tag
fn build_event(event_type: EventType, pid: u32, state: i32, sock: &Sock) -> TcpEvent {
    let mut event = TcpEvent {
        timestamp: monotonic_ns(),
        pid,
        state,
        event_type: event_type.as_u32(),
        netns: sock.netns,
        sport: sock.sport,
        dport: sock.dport,
        family: sock.family,
        saddr: [0; 4],
        daddr: [0; 4],
        saddr_v6: [0; 16],
        daddr_v6: [0; 16],
        _pad: [0; 2],
    };
    match sock.saddr {
        Address::V4(octets) => event.saddr = octets,
        Address::V6(octets) => event.saddr_v6 = octets,
    }
    match sock.daddr {
        Address::V4(octets) => event.daddr = octets,
        Address::V6(octets) => event.daddr_v6 = octets,
    }
    event
}

/// Monotonic nanosecond clock for event timestamps
fn monotonic_ns() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_common::constants::{EVENT_TYPE_CONNECT, EVENT_TYPE_RETRANSMIT, TCP_ESTABLISHED};

    fn small_engine() -> CorrelationEngine {
        CorrelationEngine::new(EngineConfig {
            flow_capacity: 64,
            cores: 2,
            queue_capacity: 16,
        })
    }

    fn task(pid: u32, tid: u32) -> TaskContext {
        TaskContext { pid, tid, cpu: 0 }
    }

    fn sock() -> Sock {
        Sock::v4(5, [10, 0, 0, 1], [10, 0, 0, 2], 40000, 80)
    }

    #[test]
    fn established_connect_attributes_from_current_context() {
        let engine = small_engine();
        engine.connect_established(&task(321, 321), &sock());

        let events = engine.channel().drain_all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EVENT_TYPE_CONNECT);
        assert_eq!(events[0].pid, 321);
        assert_eq!(events[0].state, 0);
        // No cache involvement on this path
        assert!(engine.flows().is_empty());
    }

    #[test]
    fn established_connect_emits_for_v6_too() {
        let engine = small_engine();
        let sock6 = Sock::v6(5, [1; 16], [2; 16], 40000, 443);
        engine.connect_established(&task(321, 321), &sock6);

        let events = engine.channel().drain_all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].family, AF_INET6);
        assert_eq!(events[0].saddr_v6, [1; 16]);
    }

    #[test]
    fn established_connect_with_unknown_family_emits_nothing() {
        let engine = small_engine();
        let mut bogus = sock();
        bogus.family = 99;
        engine.connect_established(&task(321, 321), &bogus);

        assert!(engine.channel().drain_all().is_empty());
        assert_eq!(engine.stats().snapshot().unsupported_family, 1);
    }

    #[test]
    fn retransmit_uses_cached_attribution_not_current_context() {
        let engine = small_engine();
        engine.connect_entry(&task(777, 10), sock());
        engine.connect_return(&task(777, 10), 0);

        // The retransmit fires in an unrelated context
        engine.retransmit(&task(1, 1), &sock(), TCP_ESTABLISHED);

        let events = engine.channel().drain_all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EVENT_TYPE_RETRANSMIT);
        assert_eq!(events[0].pid, 777);
        assert_eq!(events[0].state, TCP_ESTABLISHED);
    }

    #[test]
    fn reset_paths_share_the_attribution_mechanism() {
        let engine = small_engine();
        engine.connect_entry(&task(777, 10), sock());
        engine.connect_return(&task(777, 10), 0);

        engine.send_reset(&task(1, 1), &sock(), TCP_ESTABLISHED);
        engine.recv_reset(&task(1, 1), &sock(), TCP_ESTABLISHED);

        let events = engine.channel().drain_all();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.pid == 777));
        assert_eq!(engine.stats().snapshot().resets, 2);
    }

    #[test]
    fn dropped_events_are_counted_not_reported() {
        let engine = CorrelationEngine::new(EngineConfig {
            flow_capacity: 64,
            cores: 1,
            queue_capacity: 1,
        });
        engine.connect_established(&task(1, 1), &sock());
        engine.connect_established(&task(2, 2), &sock());

        let snapshot = engine.stats().snapshot();
        assert_eq!(snapshot.events_emitted, 1);
        assert_eq!(snapshot.events_dropped, 1);
    }
}
