//! Word-level frame representation
//!
//! Frames travel through the dispatcher as a stream of 32-bit words. Each
//! word carries its payload bytes (big-endian), a per-word side annotation
//! and the terminal marker. Ingress frames are prefixed with a 2-byte
//! alignment pad so the IPv4 header starts on a word boundary.

use serde::{Deserialize, Serialize};

/// Bytes per word
pub const WORD_BYTES: usize = 4;

/// Alignment pad prepended to every Ethernet frame
pub const ALIGN_PAD: usize = 2;

/// A single word of a frame stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Word {
    /// Payload bytes, big-endian
    pub data: u32,
    /// Out-of-band annotation (e.g. PHY error flags)
    pub side: u8,
    /// Valid bytes in this word (1..=4); always 4 unless `last`
    pub bytes: u8,
    /// Terminal marker
    pub last: bool,
}

impl Word {
    /// A full, non-terminal word
    pub fn new(data: u32) -> Self {
        Self {
            data,
            side: 0,
            bytes: WORD_BYTES as u8,
            last: false,
        }
    }

    /// A terminal word holding `bytes` valid bytes
    pub fn terminal(data: u32, bytes: u8) -> Self {
        Self {
            data,
            side: 0,
            bytes,
            last: true,
        }
    }

    /// Upper 16 bits
    #[inline]
    pub fn hi16(&self) -> u16 {
        (self.data >> 16) as u16
    }

    /// Lower 16 bits
    #[inline]
    pub fn lo16(&self) -> u16 {
        self.data as u16
    }
}

/// A complete frame as an ordered sequence of words
///
/// Serialized as a plain word list. Deserialization goes through
/// [`Frame::from_words`] so the terminal marker is always well placed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Word>", into = "Vec<Word>")]
pub struct Frame {
    words: Vec<Word>,
}

impl Frame {
    /// Build a frame from already-formed words.
    ///
    /// The terminal marker is forced onto the final word and cleared on
    /// every other word.
    pub fn from_words(mut words: Vec<Word>) -> Self {
        let n = words.len();
        for (i, w) in words.iter_mut().enumerate() {
            w.last = i + 1 == n;
            if !w.last {
                w.bytes = WORD_BYTES as u8;
            }
        }
        Self { words }
    }

    /// Pack raw Ethernet bytes (without alignment pad) into words.
    ///
    /// Every word carries the same `side` annotation.
    pub fn from_ethernet(bytes: &[u8], side: u8) -> Self {
        let mut padded = Vec::with_capacity(bytes.len() + ALIGN_PAD);
        padded.extend_from_slice(&[0u8; ALIGN_PAD]);
        padded.extend_from_slice(bytes);

        let count = padded.len().div_ceil(WORD_BYTES);
        let mut words = Vec::with_capacity(count);
        for (i, chunk) in padded.chunks(WORD_BYTES).enumerate() {
            let mut buf = [0u8; WORD_BYTES];
            buf[..chunk.len()].copy_from_slice(chunk);
            words.push(Word {
                data: u32::from_be_bytes(buf),
                side,
                bytes: chunk.len() as u8,
                last: i + 1 == count,
            });
        }
        Self { words }
    }

    /// Unpack the words back into Ethernet bytes, dropping the alignment pad.
    pub fn to_ethernet(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.words.len() * WORD_BYTES);
        for w in &self.words {
            let n = if w.last { w.bytes as usize } else { WORD_BYTES };
            out.extend_from_slice(&w.data.to_be_bytes()[..n.min(WORD_BYTES)]);
        }
        if out.len() >= ALIGN_PAD {
            out.drain(..ALIGN_PAD);
        } else {
            out.clear();
        }
        out
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// True if exactly one word carries the terminal marker and it is the final one
    pub fn is_well_formed(&self) -> bool {
        match self.words.split_last() {
            Some((tail, body)) => tail.last && body.iter().all(|w| !w.last),
            None => false,
        }
    }
}

impl From<Vec<Word>> for Frame {
    fn from(words: Vec<Word>) -> Self {
        Self::from_words(words)
    }
}

impl From<Frame> for Vec<Word> {
    fn from(frame: Frame) -> Self {
        frame.words
    }
}
