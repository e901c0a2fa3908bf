//! Egress fan-out
//!
//! Owns the three destination ports and maps a route onto them. For the
//! dual route a word leaves the shared source only when both destinations
//! accept it in the same tick, so the two copies never diverge.

use std::sync::Arc;

use super::frame::Word;
use super::normalize::Normalizer;
use super::policy::Route;
use super::queue::EgressPort;
use super::stats::DispatchStats;

/// The dispatcher's destinations
pub struct Egress<P: EgressPort> {
    slow: P,
    other: P,
    fast: Normalizer<P>,
}

impl<P: EgressPort> Egress<P> {
    /// Build the fan-out. The fast port is wrapped in the short-frame normalizer.
    pub fn new(slow: P, other: P, fast: P, stats: Arc<DispatchStats>) -> Self {
        Self {
            slow,
            other,
            fast: Normalizer::new(fast, stats),
        }
    }

    /// Whether every destination of `route` can take a word this tick
    pub fn can_accept(&self, route: Route) -> bool {
        match route {
            Route::Slow => self.slow.ready(),
            Route::Other => self.other.ready(),
            Route::Both => self.slow.ready() && self.other.ready(),
            Route::Fast => self.fast.ready(),
            Route::Drop => true,
        }
    }

    /// Hand `word` to every destination of `route`. Caller checked `can_accept`.
    pub fn deliver(&mut self, route: Route, word: Word) {
        if route.to_slow() {
            self.slow.push(word);
        }
        if route.to_other() {
            self.other.push(word);
        }
        if route.to_fast() {
            self.fast.push(word);
        }
    }

    /// Advance every port by one tick
    pub fn tick(&mut self) {
        self.slow.tick();
        self.other.tick();
        self.fast.tick();
    }

    pub fn is_idle(&self) -> bool {
        self.slow.is_idle() && self.other.is_idle() && self.fast.is_idle()
    }

    pub fn slow(&self) -> &P {
        &self.slow
    }

    pub fn other(&self) -> &P {
        &self.other
    }

    pub fn fast(&self) -> &P {
        self.fast.inner()
    }

    pub fn slow_mut(&mut self) -> &mut P {
        &mut self.slow
    }

    pub fn other_mut(&mut self) -> &mut P {
        &mut self.other
    }

    pub fn fast_mut(&mut self) -> &mut P {
        self.fast.inner_mut()
    }
}
