//! Core type definitions used across the Beacon workspace.

pub mod metadata;

pub use metadata::Metadata;
