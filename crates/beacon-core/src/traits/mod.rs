//! Core traits defined in `beacon-core` and implemented by other crates.

pub mod bridge;

pub use bridge::{BridgeEnvelope, FanoutBridge};
