//! Wire protocol: client operations, server events, and framing.

pub mod envelope;
pub mod types;

pub use envelope::ClientEnvelope;
pub use types::{ClientMessage, ErrorCode, ErrorPayload, PROTOCOL_VERSION, ServerMessage, Typist};
