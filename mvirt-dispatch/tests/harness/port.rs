//! Egress port with a scripted readiness schedule

use mvirt_dispatch::dataplane::{EgressPort, Frame, Word};

/// When a scripted port asserts ready
#[derive(Debug, Clone)]
pub enum Schedule {
    Always,
    Never,
    /// Ready from the given tick onwards
    From(u64),
    /// Ready on ticks whose index into the pattern (modulo its length) is true
    Cycle(Vec<bool>),
}

/// Records every word it accepts, along with the tick it arrived on
pub struct ScriptedPort {
    schedule: Schedule,
    tick: u64,
    words: Vec<(u64, Word)>,
}

impl ScriptedPort {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            tick: 0,
            words: Vec::new(),
        }
    }

    pub fn always() -> Self {
        Self::new(Schedule::Always)
    }

    pub fn set_schedule(&mut self, schedule: Schedule) {
        self.schedule = schedule;
    }

    pub fn words(&self) -> Vec<Word> {
        self.words.iter().map(|(_, w)| *w).collect()
    }

    /// Ticks on which words arrived
    pub fn arrival_ticks(&self) -> Vec<u64> {
        self.words.iter().map(|(t, _)| *t).collect()
    }

    /// Complete frames received so far
    pub fn frames(&self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut current = Vec::new();
        for (_, word) in &self.words {
            current.push(*word);
            if word.last {
                frames.push(Frame::from_words(std::mem::take(&mut current)));
            }
        }
        frames
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl EgressPort for ScriptedPort {
    fn ready(&self) -> bool {
        match &self.schedule {
            Schedule::Always => true,
            Schedule::Never => false,
            Schedule::From(start) => self.tick >= *start,
            Schedule::Cycle(pattern) => {
                !pattern.is_empty() && pattern[(self.tick as usize) % pattern.len()]
            }
        }
    }

    fn push(&mut self, word: Word) {
        assert!(self.ready(), "word pushed while not ready");
        self.words.push((self.tick, word));
    }

    fn tick(&mut self) {
        self.tick += 1;
    }
}
