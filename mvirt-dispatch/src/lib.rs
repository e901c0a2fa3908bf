pub mod config;
pub mod dataplane;
pub mod error;
pub mod test_util;
pub mod trace;

pub use config::{ConfigRegisters, DispatchConfig, Register};
pub use error::{DispatchError, Result};
