//! Test utilities
//!
//! Frame builders shared by unit tests and the integration harness.

pub mod packets;

pub use packets::{arp_request, icmp_frame, pad_to_minimum, test_config, udp_frame};
