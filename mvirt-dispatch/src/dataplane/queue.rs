//! Egress ports and per-destination queues
//!
//! `EgressPort` is the seam between the dispatcher and a destination. A
//! word is transferred only when the port reports `ready()` in the same
//! tick the dispatcher offers it.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

use super::frame::{Frame, Word};

/// A destination accepting a word stream
pub trait EgressPort: Send {
    /// Whether a word pushed this tick will be accepted
    fn ready(&self) -> bool;

    /// Transfer one word. Only called after `ready()` returned true this tick.
    fn push(&mut self, word: Word);

    /// Advance internal state by one tick
    fn tick(&mut self) {}

    /// No internal work pending
    fn is_idle(&self) -> bool {
        true
    }
}

/// Default queue depth in words
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Producer side of a bounded per-destination queue
pub struct EgressQueue {
    queue: Arc<ArrayQueue<Word>>,
}

/// Consumer side of a bounded per-destination queue
///
/// May live on another thread. Reassembles words into frames.
pub struct EgressDrain {
    queue: Arc<ArrayQueue<Word>>,
    partial: Vec<Word>,
}

/// Create a bounded queue holding up to `depth` words
pub fn egress_queue(depth: usize) -> (EgressQueue, EgressDrain) {
    let queue = Arc::new(ArrayQueue::new(depth.max(1)));
    (
        EgressQueue {
            queue: Arc::clone(&queue),
        },
        EgressDrain {
            queue,
            partial: Vec::new(),
        },
    )
}

impl EgressQueue {
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl EgressPort for EgressQueue {
    fn ready(&self) -> bool {
        !self.queue.is_full()
    }

    fn push(&mut self, word: Word) {
        // Single producer: ready() was checked this tick, so the slot is still free
        let pushed = self.queue.push(word);
        debug_assert!(pushed.is_ok(), "egress queue overflow");
    }
}

impl EgressDrain {
    /// Pop one word
    pub fn pop(&self) -> Option<Word> {
        self.queue.pop()
    }

    /// Pop every available word and return the frames completed by them.
    ///
    /// Words of a frame still in progress are kept for the next call.
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(word) = self.queue.pop() {
            let last = word.last;
            self.partial.push(word);
            if last {
                frames.push(Frame::from_words(std::mem::take(&mut self.partial)));
            }
        }
        frames
    }

    /// Words buffered but not yet consumed
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Words of an incomplete frame held by this drain
    pub fn partial_len(&self) -> usize {
        self.partial.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_tracks_capacity() {
        let (mut tx, rx) = egress_queue(2);
        assert!(tx.ready());
        tx.push(Word::new(1));
        assert!(tx.ready());
        tx.push(Word::new(2));
        assert!(!tx.ready());

        assert_eq!(rx.pop().map(|w| w.data), Some(1));
        assert!(tx.ready());
    }

    #[test]
    fn test_drain_reassembles_frames() {
        let (mut tx, mut rx) = egress_queue(16);
        tx.push(Word::new(1));
        tx.push(Word::terminal(2, 2));
        tx.push(Word::new(3));

        let frames = rx.drain_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 2);
        assert_eq!(rx.partial_len(), 1);

        tx.push(Word::terminal(4, 4));
        let frames = rx.drain_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].words().iter().map(|w| w.data).collect::<Vec<_>>(),
            vec![3, 4]
        );
        assert_eq!(rx.partial_len(), 0);
    }

    #[test]
    fn test_drain_across_threads() {
        let (mut tx, mut rx) = egress_queue(4);
        let consumer = std::thread::spawn(move || {
            let mut frames = Vec::new();
            while frames.is_empty() {
                frames.extend(rx.drain_frames());
                std::thread::yield_now();
            }
            frames
        });

        let words = [Word::new(1), Word::new(2), Word::new(3), Word::terminal(4, 4)];
        for w in words {
            while !tx.ready() {
                std::thread::yield_now();
            }
            tx.push(w);
        }

        let frames = consumer.join().unwrap();
        assert_eq!(frames[0].len(), 4);
    }
}
