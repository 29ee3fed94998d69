//! Route handlers.

pub mod health;
pub mod metrics;
pub mod ws;
