//! # beacon-entity
//!
//! Domain entity models for the Beacon realtime hub. Every struct in this
//! crate represents a database table row or a domain value object. All
//! entities derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and
//! database entities additionally derive `sqlx::FromRow`.

pub mod connection;
pub mod event;
pub mod presence;
pub mod room;
pub mod typing;
pub mod user;
