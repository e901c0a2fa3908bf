//! Incremental header classifier
//!
//! Evaluates destination-relevant predicates one word at a time as the
//! header streams past. Each word position inspects a disjoint set of
//! fields; comparisons read the live configuration at the moment the word
//! is evaluated.

use smoltcp::wire::{EthernetProtocol, IpProtocol};

use crate::config::DispatchConfig;

use super::frame::Word;
use super::packet::{
    DST_MAC_HI_WORD, DST_MAC_LO_WORD, ETHERTYPE_WORD, HEADER_WORDS, IP_DST_WORD, IP_PROTO_WORD,
    L4_WORD, MARKER_WORD, ethertype, icmp_type_code, ip_protocol, mac_hi, mac_lo, udp_dst_port,
};

const BROADCAST_HI: u16 = 0xffff;
const BROADCAST_LO: u32 = 0xffff_ffff;

/// Per-frame classification flags.
///
/// Every flag starts false; a flag whose word never arrived stays false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    /// Upper 16 bits of the destination MAC matched the local MAC
    pub dst_mac_hi: bool,
    /// Lower 32 bits of the destination MAC matched the local MAC
    pub dst_mac_lo: bool,
    pub bcast_hi: bool,
    pub bcast_lo: bool,
    pub is_ipv4: bool,
    pub is_udp: bool,
    pub is_icmp: bool,
    pub dst_ip_match: bool,
    pub dst_port_match: bool,
    /// ICMP type/code matched the configured no-forward pattern
    pub icmp_no_fwd: bool,
    /// Application marker present (first payload word non-zero)
    pub marker: bool,
    /// Header words observed
    pub words_seen: usize,
}

impl Classification {
    /// Destination MAC equals the local MAC
    pub fn dst_is_local(&self) -> bool {
        self.dst_mac_hi && self.dst_mac_lo
    }

    /// Destination MAC is ff:ff:ff:ff:ff:ff
    pub fn is_broadcast(&self) -> bool {
        self.bcast_hi && self.bcast_lo
    }

    /// ICMP frame matching the configured no-forward pattern
    pub fn is_control_suppressed(&self) -> bool {
        self.is_ipv4 && self.is_icmp && self.icmp_no_fwd
    }

    /// UDP to the local IP on a service port carrying the application marker
    pub fn is_fast_path(&self) -> bool {
        self.is_ipv4 && self.is_udp && self.dst_ip_match && self.dst_port_match && self.marker
    }

    /// Fewer than the full header window was observed
    pub fn is_short(&self) -> bool {
        self.words_seen < HEADER_WORDS
    }
}

/// Streaming classifier for one frame at a time
#[derive(Debug, Default)]
pub struct Classifier {
    result: Classification,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous frame
    pub fn reset(&mut self) {
        self.result = Classification::default();
    }

    /// Evaluate the next header word.
    ///
    /// Words past the header window are ignored.
    pub fn observe(&mut self, word: &Word, config: &DispatchConfig) {
        let index = self.result.words_seen;
        if index >= HEADER_WORDS {
            return;
        }
        self.result.words_seen += 1;

        let r = &mut self.result;
        match index {
            DST_MAC_HI_WORD => {
                r.dst_mac_hi = word.lo16() == mac_hi(config.local_mac);
                r.bcast_hi = word.lo16() == BROADCAST_HI;
            }
            DST_MAC_LO_WORD => {
                r.dst_mac_lo = word.data == mac_lo(config.local_mac);
                r.bcast_lo = word.data == BROADCAST_LO;
            }
            ETHERTYPE_WORD => r.is_ipv4 = ethertype(word) == EthernetProtocol::Ipv4,
            IP_PROTO_WORD => {
                let proto = ip_protocol(word);
                r.is_udp = proto == IpProtocol::Udp;
                r.is_icmp = proto == IpProtocol::Icmp;
            }
            IP_DST_WORD => r.dst_ip_match = word.data == u32::from(config.local_ip),
            L4_WORD => {
                r.dst_port_match = config.is_service_port(udp_dst_port(word));
                r.icmp_no_fwd = config
                    .icmp_suppress
                    .is_some_and(|p| p.packed() == icmp_type_code(word));
            }
            MARKER_WORD => r.marker = word.data != 0,
            _ => {}
        }
    }

    /// Result so far; final once the header window closes or the frame ends
    pub fn result(&self) -> Classification {
        self.result
    }
}
