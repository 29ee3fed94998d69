//! Connection lifecycle: handshake auth, live handles, and teardown.

pub mod authenticator;
pub mod handle;
pub mod manager;
pub mod pool;
pub mod reaper;

pub use authenticator::{AuthenticatedUser, TokenAuthenticator};
pub use handle::{ConnectionHandle, ConnectionId};
pub use manager::{CloseReason, ConnectionManager};
pub use pool::ConnectionPool;
