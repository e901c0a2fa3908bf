//! Header capture ring
//!
//! Holds the prefix of the in-flight frame while the classifier runs, then
//! replays it in arrival order once the route is known. Capacity is one
//! slot larger than the header window.

use super::frame::Word;
use super::packet::HEADER_WORDS;

/// Slots in the capture ring
pub const CAPTURE_SLOTS: usize = HEADER_WORDS + 1;

/// Fixed-capacity FIFO for the captured header words
pub struct HeaderRing {
    slots: [Word; CAPTURE_SLOTS],
    head: usize,
    len: usize,
    /// Words written since the last reset (not decremented by replay)
    captured: usize,
}

impl Default for HeaderRing {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderRing {
    pub fn new() -> Self {
        Self {
            slots: [Word::default(); CAPTURE_SLOTS],
            head: 0,
            len: 0,
            captured: 0,
        }
    }

    /// Store the next captured word.
    ///
    /// Returns `false` (and stores nothing) if the ring is full. The
    /// dispatcher never captures more than `HEADER_WORDS` words per frame,
    /// so a full ring indicates a sequencing bug.
    pub fn push(&mut self, word: Word) -> bool {
        if self.len == CAPTURE_SLOTS {
            return false;
        }
        let tail = (self.head + self.len) % CAPTURE_SLOTS;
        self.slots[tail] = word;
        self.len += 1;
        self.captured += 1;
        true
    }

    /// Next word to replay
    pub fn front(&self) -> Option<&Word> {
        (self.len > 0).then(|| &self.slots[self.head])
    }

    /// Remove the word returned by `front`
    pub fn pop(&mut self) -> Option<Word> {
        if self.len == 0 {
            return None;
        }
        let word = self.slots[self.head];
        self.head = (self.head + 1) % CAPTURE_SLOTS;
        self.len -= 1;
        Some(word)
    }

    /// Start a new frame. Only legal once the previous prefix is fully replayed.
    pub fn reset(&mut self) {
        debug_assert!(self.len == 0, "capture ring reset with words pending");
        self.head = 0;
        self.len = 0;
        self.captured = 0;
    }

    /// Words captured for the current frame
    pub fn captured(&self) -> usize {
        self.captured
    }

    /// Words still waiting to be replayed
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
