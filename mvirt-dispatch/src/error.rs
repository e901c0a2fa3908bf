//! Error types for the dispatch engine.
//!
//! Only the control path can fail. Packet-level outcomes (drops, short
//! frames, stalls) are routing decisions and show up in statistics.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown register address: {0:#04x}")]
    UnknownRegister(u8),

    #[error("Invalid value {value:#x} for register {addr:#04x}")]
    InvalidRegisterValue { addr: u8, value: u32 },

    #[error("Invalid frame trace: {0}")]
    InvalidTrace(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to spawn dispatcher thread: {0}")]
    WorkerSpawn(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
