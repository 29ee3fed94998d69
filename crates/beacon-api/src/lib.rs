//! # beacon-api
//!
//! HTTP surface for the Beacon hub, built on Axum: the WebSocket
//! upgrade endpoint, health and metrics endpoints, and the mapping
//! from domain errors to HTTP responses.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
