//! Short-frame normalizer for the fast path
//!
//! Ethernet padding makes a small datagram look longer on the wire than its
//! IPv4 total length says, and a truncated capture makes it look shorter.
//! The normalizer moves the terminal marker to where the declared length
//! puts it: trailing pad words are swallowed, missing words are emitted as
//! zeros on the following ticks. It also strips the per-word annotation,
//! which the fast-path consumer does not take.
//!
//! This is the only stage that changes frame boundaries.

use std::sync::Arc;

use smoltcp::wire::EthernetProtocol;
use tracing::trace;

use super::frame::{WORD_BYTES, Word};
use super::packet::{ETHERTYPE_WORD, IP_LENGTH_WORD, declared_extent, ethertype, ip_total_len};
use super::queue::EgressPort;
use super::stats::DispatchStats;

/// Wraps the fast-path port
pub struct Normalizer<P: EgressPort> {
    inner: P,
    stats: Arc<DispatchStats>,
    /// Position of the next word within the current frame
    index: usize,
    is_ipv4: bool,
    /// Declared word count and terminal byte count, once word 4 was seen
    declared: Option<(usize, u8)>,
    /// Discarding words up to the physical terminal marker
    swallowing: bool,
    /// Zero words still owed to extend a short frame
    pending_fill: usize,
}

impl<P: EgressPort> Normalizer<P> {
    pub fn new(inner: P, stats: Arc<DispatchStats>) -> Self {
        Self {
            inner,
            stats,
            index: 0,
            is_ipv4: false,
            declared: None,
            swallowing: false,
            pending_fill: 0,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut P {
        &mut self.inner
    }

    fn end_frame(&mut self) {
        self.index = 0;
        self.is_ipv4 = false;
        self.declared = None;
    }
}

impl<P: EgressPort> EgressPort for Normalizer<P> {
    fn ready(&self) -> bool {
        if self.swallowing {
            return true;
        }
        self.pending_fill == 0 && self.inner.ready()
    }

    fn push(&mut self, mut word: Word) {
        if self.swallowing {
            if word.last {
                self.swallowing = false;
            }
            return;
        }

        word.side = 0;
        let index = self.index;
        self.index += 1;

        if index == ETHERTYPE_WORD {
            self.is_ipv4 = ethertype(&word) == EthernetProtocol::Ipv4;
        }
        if index == IP_LENGTH_WORD && self.is_ipv4 {
            self.declared = Some(declared_extent(ip_total_len(&word)));
        }

        let Some((words, tail)) = self.declared else {
            if word.last {
                self.end_frame();
            }
            self.inner.push(word);
            return;
        };

        let position = index + 1;
        if position >= words {
            // Declared end reached (or already passed when the length is implausibly small)
            if !word.last {
                trace!(position, declared = words, "Truncating padded frame");
                self.stats.record_truncation();
                self.swallowing = true;
            }
            word.last = true;
            word.bytes = if position == words {
                tail
            } else {
                WORD_BYTES as u8
            };
            self.end_frame();
        } else if word.last {
            trace!(position, declared = words, "Extending short frame");
            self.stats.record_extension();
            word.last = false;
            // Lanes past the valid bytes become payload: zero them
            let stale = WORD_BYTES.saturating_sub(word.bytes as usize) as u32;
            word.data &= (!0u32).checked_shl(8 * stale).unwrap_or(0);
            word.bytes = WORD_BYTES as u8;
            self.pending_fill = words - position;
            self.end_frame();
            // Remember the tail byte count for the final fill word
            self.declared = Some((words, tail));
        }

        self.inner.push(word);
    }

    fn tick(&mut self) {
        if self.pending_fill > 0 && self.inner.ready() {
            let last = self.pending_fill == 1;
            let bytes = match (last, self.declared) {
                (true, Some((_, tail))) => tail,
                _ => WORD_BYTES as u8,
            };
            self.inner.push(Word {
                data: 0,
                side: 0,
                bytes,
                last,
            });
            self.pending_fill -= 1;
            if last {
                self.declared = None;
            }
        }
        self.inner.tick();
    }

    fn is_idle(&self) -> bool {
        self.pending_fill == 0 && self.inner.is_idle()
    }
}
