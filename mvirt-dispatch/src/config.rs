//! Dispatcher configuration and register surface
//!
//! The configuration is a small set of independently writable fields. Each
//! register write replaces exactly one field of an `ArcSwap` snapshot, so
//! readers on the data plane never lock and always observe a consistent
//! value per field. A write becomes visible to the next word the classifier
//! evaluates.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use smoltcp::wire::EthernetAddress;
use tracing::{info, warn};

use crate::error::{DispatchError, Result};

/// Default local MAC (locally administered)
pub const DEFAULT_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];

/// ICMP type/code whose frames must not be forwarded off the slow path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmpPattern {
    #[serde(rename = "type")]
    pub icmp_type: u8,
    pub code: u8,
}

impl IcmpPattern {
    /// Packed as it appears on the wire: `type << 8 | code`
    pub fn packed(&self) -> u16 {
        u16::from_be_bytes([self.icmp_type, self.code])
    }
}

/// Forwarding policy bits, sampled once per frame at the decision point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ForwardPolicy {
    pub forward_non_local: bool,
    pub forward_broadcast: bool,
}

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    #[serde(with = "mac_format")]
    pub local_mac: EthernetAddress,
    pub local_ip: Ipv4Addr,
    /// UDP ports routed to the fast path; 0 leaves a slot unset
    #[serde(default)]
    pub service_ports: [u16; 2],
    #[serde(default)]
    pub forward_non_local: bool,
    #[serde(default)]
    pub forward_broadcast: bool,
    #[serde(default)]
    pub icmp_suppress: Option<IcmpPattern>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            local_mac: EthernetAddress(DEFAULT_MAC),
            local_ip: Ipv4Addr::UNSPECIFIED,
            service_ports: [0, 0],
            forward_non_local: false,
            forward_broadcast: false,
            icmp_suppress: None,
        }
    }
}

impl DispatchConfig {
    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: DispatchConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn policy(&self) -> ForwardPolicy {
        ForwardPolicy {
            forward_non_local: self.forward_non_local,
            forward_broadcast: self.forward_broadcast,
        }
    }

    /// True if `port` is one of the configured (non-zero) service ports
    pub fn is_service_port(&self, port: u16) -> bool {
        port != 0 && self.service_ports.contains(&port)
    }

    /// Value of a register as it would read back
    pub fn read(&self, reg: Register) -> u32 {
        let mac = self.local_mac.0;
        match reg {
            Register::MacHi => u16::from_be_bytes([mac[0], mac[1]]) as u32,
            Register::MacLo => u32::from_be_bytes([mac[2], mac[3], mac[4], mac[5]]),
            Register::LocalIp => u32::from(self.local_ip),
            Register::ServicePort0 => self.service_ports[0] as u32,
            Register::ServicePort1 => self.service_ports[1] as u32,
            Register::ForwardCtrl => {
                (self.forward_non_local as u32) * FORWARD_NON_LOCAL
                    | (self.forward_broadcast as u32) * FORWARD_BROADCAST
            }
            Register::IcmpNoFwd => self
                .icmp_suppress
                .map(|p| ICMP_NO_FWD_ENABLE | p.packed() as u32)
                .unwrap_or(0),
        }
    }

    /// Apply one register write to this configuration
    fn apply(&mut self, reg: Register, value: u32) {
        match reg {
            Register::MacHi => {
                let [hi, lo] = (value as u16).to_be_bytes();
                self.local_mac.0[0] = hi;
                self.local_mac.0[1] = lo;
            }
            Register::MacLo => self.local_mac.0[2..].copy_from_slice(&value.to_be_bytes()),
            Register::LocalIp => self.local_ip = Ipv4Addr::from(value),
            Register::ServicePort0 => self.service_ports[0] = value as u16,
            Register::ServicePort1 => self.service_ports[1] = value as u16,
            Register::ForwardCtrl => {
                self.forward_non_local = value & FORWARD_NON_LOCAL != 0;
                self.forward_broadcast = value & FORWARD_BROADCAST != 0;
            }
            Register::IcmpNoFwd => {
                self.icmp_suppress = (value & ICMP_NO_FWD_ENABLE != 0).then(|| {
                    let [_, _, icmp_type, code] = value.to_be_bytes();
                    IcmpPattern { icmp_type, code }
                });
            }
        }
    }
}

/// FORWARD_CTRL bit: forward frames not addressed to the local MAC
pub const FORWARD_NON_LOCAL: u32 = 1 << 0;
/// FORWARD_CTRL bit: copy broadcast frames to the peer port
pub const FORWARD_BROADCAST: u32 = 1 << 1;
/// ICMP_NO_FWD bit: pattern enabled
pub const ICMP_NO_FWD_ENABLE: u32 = 1 << 16;

/// Addressable configuration registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    MacHi = 0x00,
    MacLo = 0x01,
    LocalIp = 0x02,
    ServicePort0 = 0x03,
    ServicePort1 = 0x04,
    ForwardCtrl = 0x05,
    IcmpNoFwd = 0x06,
}

impl Register {
    pub const ALL: [Register; 7] = [
        Register::MacHi,
        Register::MacLo,
        Register::LocalIp,
        Register::ServicePort0,
        Register::ServicePort1,
        Register::ForwardCtrl,
        Register::IcmpNoFwd,
    ];

    pub fn addr(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::MacHi => "MAC_HI",
            Register::MacLo => "MAC_LO",
            Register::LocalIp => "LOCAL_IP",
            Register::ServicePort0 => "SERVICE_PORT0",
            Register::ServicePort1 => "SERVICE_PORT1",
            Register::ForwardCtrl => "FORWARD_CTRL",
            Register::IcmpNoFwd => "ICMP_NO_FWD",
        }
    }

    /// Largest value the register accepts
    fn max_value(self) -> u32 {
        match self {
            Register::MacHi | Register::ServicePort0 | Register::ServicePort1 => 0xffff,
            Register::MacLo | Register::LocalIp => u32::MAX,
            Register::ForwardCtrl => FORWARD_NON_LOCAL | FORWARD_BROADCAST,
            Register::IcmpNoFwd => ICMP_NO_FWD_ENABLE | 0xffff,
        }
    }
}

impl TryFrom<u8> for Register {
    type Error = DispatchError;

    fn try_from(addr: u8) -> Result<Self> {
        Register::ALL
            .into_iter()
            .find(|r| r.addr() == addr)
            .ok_or(DispatchError::UnknownRegister(addr))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#04x})", self.name(), self.addr())
    }
}

/// Live configuration shared between the control path and the data plane
pub struct ConfigRegisters {
    current: ArcSwap<DispatchConfig>,
}

impl Default for ConfigRegisters {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}

impl ConfigRegisters {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
        }
    }

    /// Current configuration (lock-free)
    pub fn snapshot(&self) -> Arc<DispatchConfig> {
        self.current.load_full()
    }

    /// Replace the whole configuration
    pub fn replace(&self, config: DispatchConfig) {
        self.current.store(Arc::new(config));
    }

    /// Strobe a value into a register. Takes effect for the next word classified.
    pub fn write(&self, addr: u8, value: u32) -> Result<()> {
        let reg = Register::try_from(addr).inspect_err(|_| {
            warn!(addr, value, "Rejected write to unknown register");
        })?;
        if value > reg.max_value() {
            warn!(register = %reg, value, "Rejected out-of-range register value");
            return Err(DispatchError::InvalidRegisterValue { addr, value });
        }

        self.current.rcu(|cfg| {
            let mut next = DispatchConfig::clone(cfg);
            next.apply(reg, value);
            next
        });
        info!(register = %reg, value = format_args!("{value:#x}"), "Register written");
        Ok(())
    }

    /// Read a register back
    pub fn read(&self, addr: u8) -> Result<u32> {
        let reg = Register::try_from(addr)?;
        Ok(self.current.load().read(reg))
    }
}

/// Parse a colon-separated MAC address
pub fn parse_mac(mac: &str) -> Option<[u8; 6]> {
    let parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return None;
    }

    let mut bytes = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        bytes[i] = u8::from_str_radix(part, 16).ok()?;
    }
    Some(bytes)
}

mod mac_format {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use smoltcp::wire::EthernetAddress;

    use super::parse_mac;

    pub fn serialize<S: Serializer>(mac: &EthernetAddress, s: S) -> Result<S::Ok, S::Error> {
        let m = mac.0;
        s.collect_str(&format_args!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        ))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<EthernetAddress, D::Error> {
        let s = String::deserialize(d)?;
        parse_mac(&s)
            .map(EthernetAddress)
            .ok_or_else(|| de::Error::custom(format!("invalid MAC address: {s}")))
    }
}
