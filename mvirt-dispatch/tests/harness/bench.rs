//! Tick-level driver around a dispatcher with scripted ports

use std::sync::Arc;

use mvirt_dispatch::config::{ConfigRegisters, DispatchConfig};
use mvirt_dispatch::dataplane::{
    DispatchState, DispatchStats, Dispatcher, Egress, Frame, FrameFeeder, StatsSnapshot,
};

use super::port::ScriptedPort;

pub struct Bench {
    pub dispatcher: Dispatcher<ScriptedPort>,
    pub feeder: FrameFeeder,
    pub registers: Arc<ConfigRegisters>,
    /// Ticks run so far
    pub ticks: u64,
    /// Ingress words accepted so far
    pub accepted: u64,
}

impl Bench {
    /// Bench whose ports are always ready
    pub fn new(config: DispatchConfig) -> Self {
        Self::with_ports(
            config,
            ScriptedPort::always(),
            ScriptedPort::always(),
            ScriptedPort::always(),
        )
    }

    pub fn with_ports(
        config: DispatchConfig,
        slow: ScriptedPort,
        other: ScriptedPort,
        fast: ScriptedPort,
    ) -> Self {
        let registers = Arc::new(ConfigRegisters::new(config));
        let stats = Arc::new(DispatchStats::default());
        let egress = Egress::new(slow, other, fast, Arc::clone(&stats));
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&registers), egress, stats),
            feeder: FrameFeeder::new(),
            registers,
            ticks: 0,
            accepted: 0,
        }
    }

    /// Queue raw Ethernet bytes as a frame
    pub fn send(&mut self, bytes: &[u8]) -> Frame {
        let frame = Frame::from_ethernet(bytes, 0);
        self.feeder.push(frame.clone());
        frame
    }

    pub fn send_frame(&mut self, frame: Frame) {
        self.feeder.push(frame);
    }

    /// Run one tick; returns whether an ingress word was accepted
    pub fn tick(&mut self) -> bool {
        let accepted = self.dispatcher.step(&mut self.feeder);
        self.ticks += 1;
        if accepted {
            self.accepted += 1;
        }
        accepted
    }

    pub fn run_ticks(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Run until every queued frame has left the dispatcher.
    ///
    /// Panics if that takes more than `max_ticks`.
    pub fn run_until_idle(&mut self, max_ticks: u64) {
        let start = self.ticks;
        while !(self.feeder.is_empty() && self.dispatcher.is_idle()) {
            assert!(
                self.ticks - start < max_ticks,
                "dispatcher not idle after {max_ticks} ticks (state {:?})",
                self.dispatcher.state()
            );
            self.tick();
        }
    }

    pub fn state(&self) -> DispatchState {
        self.dispatcher.state()
    }

    pub fn slow(&self) -> &ScriptedPort {
        self.dispatcher.egress().slow()
    }

    pub fn other(&self) -> &ScriptedPort {
        self.dispatcher.egress().other()
    }

    pub fn fast(&self) -> &ScriptedPort {
        self.dispatcher.egress().fast()
    }

    pub fn slow_mut(&mut self) -> &mut ScriptedPort {
        self.dispatcher.egress_mut().slow_mut()
    }

    pub fn other_mut(&mut self) -> &mut ScriptedPort {
        self.dispatcher.egress_mut().other_mut()
    }

    pub fn fast_mut(&mut self) -> &mut ScriptedPort {
        self.dispatcher.egress_mut().fast_mut()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.dispatcher.stats().snapshot()
    }

    /// Words delivered to any port
    pub fn delivered_words(&self) -> usize {
        self.slow().words().len() + self.other().words().len() + self.fast().words().len()
    }
}
