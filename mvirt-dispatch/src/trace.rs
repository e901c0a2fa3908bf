//! Frame trace files
//!
//! A trace is a JSON list of Ethernet frames, hex-encoded without the
//! alignment pad:
//!
//! ```json
//! [
//!   { "frame": "ffffffffffff5254001234560806...", "side": 0 },
//!   { "frame": "020000aabbcc5254001234560800..." }
//! ]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataplane::Frame;
use crate::error::{DispatchError, Result};

/// One frame of a trace file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFrame {
    /// Ethernet bytes as hex
    pub frame: String,
    /// Side annotation applied to every word
    #[serde(default)]
    pub side: u8,
}

impl TraceFrame {
    pub fn to_frame(&self) -> Result<Frame> {
        let bytes = decode_hex(&self.frame)?;
        if bytes.is_empty() {
            return Err(DispatchError::InvalidTrace("empty frame".to_string()));
        }
        Ok(Frame::from_ethernet(&bytes, self.side))
    }
}

/// Load and decode a trace file
pub fn load_trace(path: &Path) -> Result<Vec<Frame>> {
    let raw = std::fs::read_to_string(path)?;
    let entries: Vec<TraceFrame> = serde_json::from_str(&raw)?;
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            entry.to_frame().map_err(|e| match e {
                DispatchError::InvalidTrace(msg) => {
                    DispatchError::InvalidTrace(format!("frame {i}: {msg}"))
                }
                other => other,
            })
        })
        .collect()
}

/// Decode a hex string; whitespace and `:` separators are ignored
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = s
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(DispatchError::InvalidTrace("odd number of hex digits".to_string()));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let hi = hex_value(pair[0])?;
            let lo = hex_value(pair[1])?;
            Ok(hi << 4 | lo)
        })
        .collect()
}

/// Encode bytes as lowercase hex
pub fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_value(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(DispatchError::InvalidTrace(format!(
            "invalid hex digit {:?}",
            c as char
        ))),
    }
}
