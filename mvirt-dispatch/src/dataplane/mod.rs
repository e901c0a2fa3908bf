//! Data plane: frame classification and dispatch
//!
//! Frames enter as a word stream and leave on one of three destinations:
//! the slow/control consumer, the peer port, or the fast-path consumer.
//!
//! Architecture:
//! - The header prefix is captured into a small ring while the classifier
//!   evaluates it word by word
//! - A rule table turns the classification into a route
//! - The captured prefix is replayed to the route, then the rest of the
//!   frame passes through
//! - The dual route advances only when both destinations accept
//! - Fast-path frames are normalized to their declared IPv4 length

pub mod capture;
pub mod classify;
pub mod dispatch;
pub mod fanout;
pub mod frame;
pub mod normalize;
pub mod packet;
pub mod policy;
pub mod queue;
pub mod stats;
pub mod worker;

pub use capture::{CAPTURE_SLOTS, HeaderRing};
pub use classify::{Classification, Classifier};
pub use dispatch::{DispatchState, Dispatcher, EgressDrains, FrameFeeder};
pub use fanout::Egress;
pub use frame::{ALIGN_PAD, Frame, WORD_BYTES, Word};
pub use normalize::Normalizer;
pub use packet::HEADER_WORDS;
pub use policy::{RULES, Route, Rule, decide};
pub use queue::{DEFAULT_QUEUE_DEPTH, EgressDrain, EgressPort, EgressQueue, egress_queue};
pub use stats::{DispatchStats, StatsSnapshot};
pub use worker::{WorkerConfig, WorkerHandle, spawn_dispatcher};
