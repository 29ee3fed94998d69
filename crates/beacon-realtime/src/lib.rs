//! # beacon-realtime
//!
//! Realtime core for the Beacon hub. Provides:
//!
//! - WebSocket connection lifecycle with JWT handshake auth and a
//!   per-user connection cap
//! - Named rooms with datastore-backed membership and local fan-out
//! - Aggregate presence (connection counting plus explicit overrides)
//! - Self-expiring typing indicators
//! - Multi-instance fan-out via Redis pub/sub, with an in-memory
//!   bridge for single-instance runs and tests
//! - An append-only event log and engine metrics

pub mod audit;
pub mod bridge;
pub mod connection;
pub mod dispatch;
pub mod engine;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod room;
pub mod typing;

pub use connection::manager::{CloseReason, ConnectionManager};
pub use connection::pool::ConnectionPool;
pub use engine::{EngineStores, RealtimeEngine};
pub use presence::tracker::PresenceTracker;
pub use room::RoomManager;
