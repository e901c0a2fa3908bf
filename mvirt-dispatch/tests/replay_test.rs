//! Replays the demo trace through queue-backed egress ports

use std::path::PathBuf;
use std::sync::Arc;

use mvirt_dispatch::config::{ConfigRegisters, DispatchConfig};
use mvirt_dispatch::dataplane::{Dispatcher, FrameFeeder};
use mvirt_dispatch::trace::load_trace;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

#[test]
fn test_demo_trace_routes() {
    let _ = tracing_subscriber::fmt::try_init();

    let config = DispatchConfig::load(&demo("dispatch.json")).expect("Failed to load config");
    let frames = load_trace(&demo("trace.json")).expect("Failed to load trace");
    assert_eq!(frames.len(), 5);

    let (mut dispatcher, mut drains) =
        Dispatcher::with_queues(Arc::new(ConfigRegisters::new(config)), 8);
    let mut feeder = FrameFeeder::new();
    for frame in &frames {
        feeder.push(frame.clone());
    }

    let mut slow = Vec::new();
    let mut other = Vec::new();
    let mut fast = Vec::new();
    let mut ticks = 0;
    while !(feeder.is_empty() && dispatcher.is_idle()) {
        dispatcher.step(&mut feeder);
        ticks += 1;
        assert!(ticks < 10_000, "replay did not finish");

        // Consumers keep up only every other tick
        if ticks % 2 == 0 {
            slow.extend(drains.slow.drain_frames());
            other.extend(drains.other.drain_frames());
            fast.extend(drains.fast.drain_frames());
        }
    }
    slow.extend(drains.slow.drain_frames());
    other.extend(drains.other.drain_frames());
    fast.extend(drains.fast.drain_frames());

    // ARP broadcast to both, DNS query to slow
    assert_eq!(slow, vec![frames[0].clone(), frames[3].clone()]);
    assert_eq!(other, vec![frames[0].clone()]);

    // Both service-port datagrams reach the fast path, the padded one trimmed
    assert_eq!(fast.len(), 2);
    assert_eq!(fast[0].to_ethernet(), frames[1].to_ethernet());
    assert!(fast[0].words().iter().all(|w| w.side == 0));
    assert_eq!(fast[1].to_ethernet().len(), 14 + 20 + 8 + 4);

    let stats = dispatcher.stats().snapshot();
    assert_eq!(stats.both, 1);
    assert_eq!(stats.fast, 2);
    assert_eq!(stats.slow, 1);
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.truncations, 1);
}
