//! Ethernet frame builders for tests
//!
//! Uses smoltcp for packet construction so header layouts match what the
//! classifier parses on the wire.

use std::net::Ipv4Addr;

use smoltcp::phy::ChecksumCapabilities;
use smoltcp::wire::{
    ArpOperation, ArpPacket, ArpRepr, EthernetAddress, EthernetFrame, EthernetProtocol,
    EthernetRepr, Icmpv4Message, Icmpv4Packet, IpAddress, IpProtocol, Ipv4Packet, Ipv4Repr,
    UdpPacket, UdpRepr,
};

use crate::config::DispatchConfig;

// ============================================================================
// Constants
// ============================================================================

pub const ETHERNET_HDR_SIZE: usize = 14;
pub const IP_HDR_SIZE: usize = 20;
pub const UDP_HDR_SIZE: usize = 8;
pub const ICMP_HDR_SIZE: usize = 8;
pub const ARP_PKT_SIZE: usize = 28;

/// Minimum Ethernet frame without FCS
pub const MIN_FRAME_SIZE: usize = 60;

pub const BROADCAST_MAC: [u8; 6] = [0xff; 6];
pub const LOCAL_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0xaa, 0xbb, 0xcc];
pub const REMOTE_MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
pub const LOCAL_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
pub const REMOTE_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

/// Port configured as fast-path service port by [`test_config`]
pub const SERVICE_PORT: u16 = 7777;
const EPHEMERAL_PORT: u16 = 49152;

/// Configuration owning `LOCAL_MAC`/`LOCAL_IP` with one service port and forwarding disabled
pub fn test_config() -> DispatchConfig {
    DispatchConfig {
        local_mac: EthernetAddress(LOCAL_MAC),
        local_ip: LOCAL_IP,
        service_ports: [SERVICE_PORT, 0],
        forward_non_local: false,
        forward_broadcast: false,
        icmp_suppress: None,
    }
}

fn emit_ethernet(packet: &mut [u8], dst_mac: [u8; 6], src_mac: [u8; 6], ethertype: EthernetProtocol) {
    let eth_repr = EthernetRepr {
        src_addr: EthernetAddress(src_mac),
        dst_addr: EthernetAddress(dst_mac),
        ethertype,
    };
    let mut eth_frame = EthernetFrame::new_unchecked(packet);
    eth_repr.emit(&mut eth_frame);
}

fn emit_ipv4(
    packet: &mut [u8],
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    next_header: IpProtocol,
    payload_len: usize,
) {
    let ip_repr = Ipv4Repr {
        src_addr: src_ip,
        dst_addr: dst_ip,
        next_header,
        payload_len,
        hop_limit: 64,
    };
    let mut ip_packet = Ipv4Packet::new_unchecked(&mut packet[ETHERNET_HDR_SIZE..]);
    ip_repr.emit(&mut ip_packet, &ChecksumCapabilities::default());
}

// ============================================================================
// UDP
// ============================================================================

/// Create an Ethernet/IPv4/UDP frame
pub fn udp_frame(
    dst_mac: [u8; 6],
    src_mac: [u8; 6],
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let udp_len = UDP_HDR_SIZE + payload.len();
    let mut packet = vec![0u8; ETHERNET_HDR_SIZE + IP_HDR_SIZE + udp_len];

    emit_ethernet(&mut packet, dst_mac, src_mac, EthernetProtocol::Ipv4);
    emit_ipv4(&mut packet, src_ip, dst_ip, IpProtocol::Udp, udp_len);

    let udp_repr = UdpRepr {
        src_port: EPHEMERAL_PORT,
        dst_port,
    };
    let mut udp_packet =
        UdpPacket::new_unchecked(&mut packet[ETHERNET_HDR_SIZE + IP_HDR_SIZE..]);
    udp_repr.emit(
        &mut udp_packet,
        &IpAddress::Ipv4(src_ip),
        &IpAddress::Ipv4(dst_ip),
        payload.len(),
        |buf| buf.copy_from_slice(payload),
        &ChecksumCapabilities::default(),
    );

    packet
}

// ============================================================================
// ICMP
// ============================================================================

/// Create an Ethernet/IPv4/ICMP frame with an arbitrary type and code
pub fn icmp_frame(
    dst_mac: [u8; 6],
    src_mac: [u8; 6],
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    icmp_type: u8,
    code: u8,
) -> Vec<u8> {
    let data = b"dispatch";
    let icmp_len = ICMP_HDR_SIZE + data.len();
    let mut packet = vec![0u8; ETHERNET_HDR_SIZE + IP_HDR_SIZE + icmp_len];

    emit_ethernet(&mut packet, dst_mac, src_mac, EthernetProtocol::Ipv4);
    emit_ipv4(&mut packet, src_ip, dst_ip, IpProtocol::Icmp, icmp_len);

    let icmp_start = ETHERNET_HDR_SIZE + IP_HDR_SIZE;
    packet[icmp_start + ICMP_HDR_SIZE..].copy_from_slice(data);
    let mut icmp_packet = Icmpv4Packet::new_unchecked(&mut packet[icmp_start..]);
    icmp_packet.set_msg_type(Icmpv4Message::from(icmp_type));
    icmp_packet.set_msg_code(code);
    icmp_packet.fill_checksum();

    packet
}

// ============================================================================
// ARP
// ============================================================================

/// Create a broadcast ARP request
pub fn arp_request(sender_mac: [u8; 6], sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Vec<u8> {
    let mut packet = vec![0u8; ETHERNET_HDR_SIZE + ARP_PKT_SIZE];
    emit_ethernet(&mut packet, BROADCAST_MAC, sender_mac, EthernetProtocol::Arp);

    let arp_repr = ArpRepr::EthernetIpv4 {
        operation: ArpOperation::Request,
        source_hardware_addr: EthernetAddress(sender_mac),
        source_protocol_addr: sender_ip,
        target_hardware_addr: EthernetAddress([0; 6]),
        target_protocol_addr: target_ip,
    };
    let mut arp_packet = ArpPacket::new_unchecked(&mut packet[ETHERNET_HDR_SIZE..]);
    arp_repr.emit(&mut arp_packet);

    packet
}

/// Zero-pad a frame to the Ethernet minimum, as a MAC would on transmit
pub fn pad_to_minimum(mut frame: Vec<u8>) -> Vec<u8> {
    if frame.len() < MIN_FRAME_SIZE {
        frame.resize(MIN_FRAME_SIZE, 0);
    }
    frame
}
