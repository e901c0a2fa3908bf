//! Test harness for dispatcher integration tests
//!
//! Provides egress ports with scripted readiness and a bench that drives a
//! dispatcher tick by tick.

#![allow(dead_code)]

pub mod bench;
pub mod port;

pub use bench::Bench;
pub use port::{Schedule, ScriptedPort};
