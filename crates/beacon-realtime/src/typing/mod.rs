//! Typing indicators.

pub mod engine;

pub use engine::TypingEngine;
