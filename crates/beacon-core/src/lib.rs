//! # beacon-core
//!
//! Core crate for the Beacon realtime hub. Contains configuration schemas,
//! the fan-out bridge trait, shared protocol types, and the unified error
//! system.
//!
//! This crate has **no** internal dependencies on other Beacon crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
