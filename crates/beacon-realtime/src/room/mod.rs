//! Rooms: local subscriptions and membership coordination.

pub mod manager;
pub mod registry;
pub mod subscription;

pub use manager::{JoinAck, RoomManager};
pub use registry::RoomRegistry;
