//! Dispatch state machine
//!
//! Sequences one frame at a time through capture, decision and forwarding:
//!
//! ```text
//!   Idle --first word--> Capturing --H words or terminal--> Deciding
//!     ^                                                        |
//!     |                                                    route
//!     |                                                        v
//!     +-------- terminal word accepted downstream ------- Forward(route)
//! ```
//!
//! Each call to [`Dispatcher::tick`] advances the machine by one tick and
//! moves at most one word out of the machine. In `Forward` the captured
//! prefix is replayed first; the rest of the frame then passes through live.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::ConfigRegisters;

use super::capture::HeaderRing;
use super::classify::Classifier;
use super::fanout::Egress;
use super::frame::{Frame, Word};
use super::packet::HEADER_WORDS;
use super::policy::{self, Route};
use super::queue::{EgressDrain, EgressPort, EgressQueue, egress_queue};
use super::stats::DispatchStats;

/// Dispatcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// No frame in flight
    Idle,
    /// Header words are being captured and classified
    Capturing,
    /// Header complete (or frame ended); route is computed next tick
    Deciding,
    /// Replaying the prefix, then passing the remaining words, to the route
    Forward(Route),
}

/// Consumer ends of the three egress queues
pub struct EgressDrains {
    pub slow: EgressDrain,
    pub other: EgressDrain,
    pub fast: EgressDrain,
}

/// Frame classification and dispatch engine
pub struct Dispatcher<P: EgressPort = EgressQueue> {
    config: Arc<ConfigRegisters>,
    stats: Arc<DispatchStats>,
    classifier: Classifier,
    ring: HeaderRing,
    egress: Egress<P>,
    state: DispatchState,
    /// The terminal word of the current frame sits in the capture ring
    captured_last: bool,
    /// Words of the current frame accepted from ingress
    frame_words: usize,
}

impl Dispatcher<EgressQueue> {
    /// Create a dispatcher feeding three bounded queues of `depth` words each
    pub fn with_queues(config: Arc<ConfigRegisters>, depth: usize) -> (Self, EgressDrains) {
        let stats = Arc::new(DispatchStats::default());
        let (slow, slow_rx) = egress_queue(depth);
        let (other, other_rx) = egress_queue(depth);
        let (fast, fast_rx) = egress_queue(depth);
        let egress = Egress::new(slow, other, fast, Arc::clone(&stats));
        let drains = EgressDrains {
            slow: slow_rx,
            other: other_rx,
            fast: fast_rx,
        };
        (Self::new(config, egress, stats), drains)
    }
}

impl<P: EgressPort> Dispatcher<P> {
    /// Create a dispatcher over an existing fan-out.
    ///
    /// `stats` should be the same handle the fan-out was built with.
    pub fn new(config: Arc<ConfigRegisters>, egress: Egress<P>, stats: Arc<DispatchStats>) -> Self {
        Self {
            config,
            stats,
            classifier: Classifier::new(),
            ring: HeaderRing::new(),
            egress,
            state: DispatchState::Idle,
            captured_last: false,
            frame_words: 0,
        }
    }

    /// Advance one tick.
    ///
    /// `input` is the word offered by the ingress this tick (`None` when
    /// the source is not valid). Returns whether the word was accepted;
    /// a rejected word must be offered again.
    pub fn tick(&mut self, input: Option<Word>) -> bool {
        self.egress.tick();

        match self.state {
            DispatchState::Idle => self.start(input),
            DispatchState::Capturing => match input {
                Some(word) => {
                    self.capture(word);
                    true
                }
                None => false,
            },
            DispatchState::Deciding => {
                self.decide();
                false
            }
            DispatchState::Forward(route) => self.forward(route, input),
        }
    }

    /// Offer the feeder's current word and advance it if accepted
    pub fn step(&mut self, feeder: &mut FrameFeeder) -> bool {
        let accepted = self.tick(feeder.current());
        if accepted {
            feeder.advance();
        }
        accepted
    }

    /// Begin a new frame with `input` as its first word
    fn start(&mut self, input: Option<Word>) -> bool {
        let Some(word) = input else {
            return false;
        };
        self.ring.reset();
        self.classifier.reset();
        self.captured_last = false;
        self.frame_words = 0;
        self.state = DispatchState::Capturing;
        self.capture(word);
        true
    }

    fn capture(&mut self, word: Word) {
        let stored = self.ring.push(word);
        debug_assert!(stored, "capture ring overflow");

        let config = self.config.snapshot();
        self.classifier.observe(&word, &config);
        self.stats.record_word_in();
        self.frame_words += 1;

        if word.last {
            self.captured_last = true;
            self.state = DispatchState::Deciding;
        } else if self.ring.captured() == HEADER_WORDS {
            self.state = DispatchState::Deciding;
        }
    }

    fn decide(&mut self) {
        let class = self.classifier.result();
        let policy = self.config.snapshot().policy();
        let (route, rule) = policy::decide(&class, &policy);

        if self.captured_last && class.is_short() {
            self.stats.record_short_frame();
        }
        self.stats.record_route(route);

        debug!(
            %route,
            rule,
            header_words = class.words_seen,
            short = self.captured_last && class.is_short(),
            "Frame classified"
        );
        self.state = DispatchState::Forward(route);
    }

    fn forward(&mut self, route: Route, input: Option<Word>) -> bool {
        if let Some(&word) = self.ring.front() {
            if !self.egress.can_accept(route) {
                self.stats.record_stall();
                trace!(%route, "Replay stalled on egress");
                return false;
            }
            self.ring.pop();
            self.egress.deliver(route, word);
            if word.last {
                self.finish(route);
                // The ingress was not used this tick: take the next frame's first word now
                return self.start(input);
            }
            return false;
        }

        let Some(word) = input else {
            return false;
        };
        if !self.egress.can_accept(route) {
            self.stats.record_stall();
            trace!(%route, "Pass-through stalled on egress");
            return false;
        }
        self.egress.deliver(route, word);
        self.stats.record_word_in();
        self.frame_words += 1;
        if word.last {
            self.finish(route);
        }
        true
    }

    fn finish(&mut self, route: Route) {
        trace!(%route, words = self.frame_words, "Frame complete");
        self.state = DispatchState::Idle;
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// No frame in flight and no egress work pending
    pub fn is_idle(&self) -> bool {
        self.state == DispatchState::Idle && self.egress.is_idle()
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    pub fn config(&self) -> &Arc<ConfigRegisters> {
        &self.config
    }

    pub fn egress(&self) -> &Egress<P> {
        &self.egress
    }

    pub fn egress_mut(&mut self) -> &mut Egress<P> {
        &mut self.egress
    }
}

/// Presents queued frames to the dispatcher one word at a time
#[derive(Debug, Default)]
pub struct FrameFeeder {
    frames: VecDeque<Frame>,
    position: usize,
}

impl FrameFeeder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame. Empty frames carry no terminal word and are skipped.
    pub fn push(&mut self, frame: Frame) {
        if !frame.is_empty() {
            self.frames.push_back(frame);
        }
    }

    /// Word offered this tick
    pub fn current(&self) -> Option<Word> {
        self.frames
            .front()
            .and_then(|f| f.words().get(self.position))
            .copied()
    }

    /// Move past the word returned by `current`
    pub fn advance(&mut self) {
        let Some(frame) = self.frames.front() else {
            return;
        };
        self.position += 1;
        if self.position >= frame.len() {
            self.frames.pop_front();
            self.position = 0;
        }
    }

    /// Frames not yet fully accepted
    pub fn pending(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
