//! Header word layout and field extraction
//!
//! With the 2-byte alignment pad, an Ethernet/IPv4/UDP header occupies the
//! first twelve 32-bit words of a frame:
//!
//! ```text
//!  word | contents
//! ------+----------------------------------------------
//!   0   | pad(2)              dst MAC[0..2]
//!   1   | dst MAC[2..6]
//!   2   | src MAC[0..4]
//!   3   | src MAC[4..6]       ethertype
//!   4   | ver/ihl tos         total length
//!   5   | ident               flags/fragment
//!   6   | ttl proto           header checksum
//!   7   | src IP
//!   8   | dst IP
//!   9   | UDP src port        UDP dst port      (ICMP: type code checksum)
//!  10   | UDP length          UDP checksum
//!  11   | first 4 bytes of the UDP payload
//! ```

use smoltcp::wire::{EthernetAddress, EthernetProtocol, IpProtocol};

use super::frame::{ALIGN_PAD, WORD_BYTES, Word};

/// Number of header words the classifier inspects
pub const HEADER_WORDS: usize = 12;

/// Ethernet header size
pub const ETHERNET_HDR_SIZE: usize = 14;

pub const DST_MAC_HI_WORD: usize = 0;
pub const DST_MAC_LO_WORD: usize = 1;
pub const ETHERTYPE_WORD: usize = 3;
pub const IP_LENGTH_WORD: usize = 4;
pub const IP_PROTO_WORD: usize = 6;
pub const IP_DST_WORD: usize = 8;
pub const L4_WORD: usize = 9;
pub const MARKER_WORD: usize = 11;

/// Upper 16 bits of a MAC address, as laid out in word 0
pub fn mac_hi(mac: EthernetAddress) -> u16 {
    u16::from_be_bytes([mac.0[0], mac.0[1]])
}

/// Lower 32 bits of a MAC address, as laid out in word 1
pub fn mac_lo(mac: EthernetAddress) -> u32 {
    u32::from_be_bytes([mac.0[2], mac.0[3], mac.0[4], mac.0[5]])
}

/// Ethertype carried in word 3
pub fn ethertype(word: &Word) -> EthernetProtocol {
    EthernetProtocol::from(word.lo16())
}

/// IPv4 protocol number carried in word 6
pub fn ip_protocol(word: &Word) -> IpProtocol {
    IpProtocol::from((word.data >> 16) as u8)
}

/// IPv4 total length carried in word 4
pub fn ip_total_len(word: &Word) -> u16 {
    word.lo16()
}

/// UDP destination port carried in word 9
pub fn udp_dst_port(word: &Word) -> u16 {
    word.lo16()
}

/// ICMP type and code carried in word 9, as `type << 8 | code`
pub fn icmp_type_code(word: &Word) -> u16 {
    word.hi16()
}

/// Word count and terminal byte count of a frame whose IPv4 total length is `total_len`
pub fn declared_extent(total_len: u16) -> (usize, u8) {
    let bytes = ALIGN_PAD + ETHERNET_HDR_SIZE + total_len as usize;
    let words = bytes.div_ceil(WORD_BYTES);
    let tail = match bytes % WORD_BYTES {
        0 => WORD_BYTES,
        n => n,
    };
    (words, tail as u8)
}
