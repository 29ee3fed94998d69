//! # beacon-database
//!
//! PostgreSQL connection management, the store traits the realtime core
//! runs against, and the concrete repository implementations backing them.

pub mod migration;
pub mod pool;
pub mod repositories;
pub mod stores;

pub use pool::DatabasePool;
