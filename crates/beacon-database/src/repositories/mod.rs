//! Concrete PostgreSQL repository implementations.

pub mod connection;
pub mod event;
pub mod member;
pub mod presence;
pub mod room;
pub mod typing;

pub use connection::ConnectionRepository;
pub use event::EventRepository;
pub use member::RoomMemberRepository;
pub use presence::PresenceRepository;
pub use room::RoomRepository;
pub use typing::TypingRepository;
