//! Replay a small synthetic occurrence sequence through the engine and
//! print the emitted records plus the health counters as JSON.
//!
//! ```bash
//! RUST_LOG=trace cargo run -p flow-engine --example replay
//! ```

use anyhow::Result;
use flow_common::constants::{tcp_state_name, TCP_ESTABLISHED};
use flow_common::types::EventType;
use flow_engine::{CorrelationEngine, EngineConfig, Sock, TaskContext};
use log::info;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let engine = CorrelationEngine::new(EngineConfig {
        flow_capacity: 1024,
        cores: 2,
        queue_capacity: 256,
    });

    let owner = TaskContext { pid: 4242, tid: 4242, cpu: 0 };
    let kernel_worker = TaskContext { pid: 0, tid: 0, cpu: 1 };

    let sock = Sock::v4(5, [10, 0, 0, 1], [10, 0, 0, 2], 40000, 80);
    let stranger = Sock::v4(5, [192, 168, 1, 1], [192, 168, 1, 2], 55555, 443);

    // A connect attempt observed end to end, then established
    engine.connect_entry(&owner, sock);
    engine.connect_return(&owner, 0);
    engine.connect_established(&owner, &sock);

    // Retransmits later, from a context that is not the owner
    engine.retransmit(&kernel_worker, &sock, TCP_ESTABLISHED);

    // A tuple the engine never saw connect
    engine.retransmit(&kernel_worker, &stranger, TCP_ESTABLISHED);

    for event in engine.channel().drain_all() {
        info!(
            "{:?} {} -> {} pid={} state={}",
            EventType::from_u32(event.event_type),
            event.source_ip().map(|ip| ip.to_string()).unwrap_or_default(),
            event.destination_ip().map(|ip| ip.to_string()).unwrap_or_default(),
            event.pid,
            tcp_state_name(event.state),
        );
        println!("{}", serde_json::to_string(&event)?);
    }

    println!("{}", serde_json::to_string_pretty(&engine.stats().snapshot())?);
    Ok(())
}
