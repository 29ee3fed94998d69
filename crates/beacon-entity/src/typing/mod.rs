//! Typing indicator domain entities.

pub mod model;

pub use model::TypingIndicator;
