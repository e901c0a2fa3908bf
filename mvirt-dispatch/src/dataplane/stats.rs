//! Dispatcher counters
//!
//! Relaxed atomics: the data plane increments, anyone may read a snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::policy::Route;

#[derive(Debug, Default)]
pub struct DispatchStats {
    frames: [AtomicU64; Route::ALL.len()],
    words_in: AtomicU64,
    short_frames: AtomicU64,
    truncations: AtomicU64,
    extensions: AtomicU64,
    stall_ticks: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub slow: u64,
    pub other: u64,
    pub both: u64,
    pub fast: u64,
    pub dropped: u64,
    pub words_in: u64,
    pub short_frames: u64,
    pub truncations: u64,
    pub extensions: u64,
    pub stall_ticks: u64,
}

impl StatsSnapshot {
    /// Frames that reached a routing decision
    pub fn frames(&self) -> u64 {
        self.slow + self.other + self.both + self.fast + self.dropped
    }

    pub fn for_route(&self, route: Route) -> u64 {
        match route {
            Route::Slow => self.slow,
            Route::Other => self.other,
            Route::Both => self.both,
            Route::Fast => self.fast,
            Route::Drop => self.dropped,
        }
    }
}

impl DispatchStats {
    pub fn record_route(&self, route: Route) {
        self.frames[route.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_word_in(&self) {
        self.words_in.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_short_frame(&self) {
        self.short_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_truncation(&self) {
        self.truncations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_extension(&self) {
        self.extensions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stall(&self) {
        self.stall_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let frames = |r: Route| self.frames[r.index()].load(Ordering::Relaxed);
        StatsSnapshot {
            slow: frames(Route::Slow),
            other: frames(Route::Other),
            both: frames(Route::Both),
            fast: frames(Route::Fast),
            dropped: frames(Route::Drop),
            words_in: self.words_in.load(Ordering::Relaxed),
            short_frames: self.short_frames.load(Ordering::Relaxed),
            truncations: self.truncations.load(Ordering::Relaxed),
            extensions: self.extensions.load(Ordering::Relaxed),
            stall_ticks: self.stall_ticks.load(Ordering::Relaxed),
        }
    }
}
