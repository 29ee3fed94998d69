//! Inbound and outbound WebSocket message type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use beacon_core::error::{AppError, ErrorKind};
use beacon_core::types::Metadata;
use beacon_entity::presence::PresenceStatus;

/// Protocol version advertised in the `connected` event.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Operations sent by the client to the server.
///
/// The `op` tag is a closed set; frames with an unknown tag fail to
/// parse and are answered with an `error` event, never dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum ClientMessage {
    /// Join a room by name.
    #[serde(rename = "room:join")]
    RoomJoin {
        /// Room name.
        room_name: String,
    },
    /// Leave a room by name.
    #[serde(rename = "room:leave")]
    RoomLeave {
        /// Room name.
        room_name: String,
    },
    /// Publish a message to a room.
    #[serde(rename = "message:send")]
    MessageSend {
        /// Target room name.
        room_name: String,
        /// Message body; passed through, never persisted.
        content: String,
        /// Optional thread the message belongs to.
        #[serde(default)]
        thread_id: Option<Uuid>,
        /// Opaque client metadata, forwarded uninterpreted.
        #[serde(default)]
        metadata: Option<Metadata>,
    },
    /// Start (or renew) a typing indicator.
    #[serde(rename = "typing:start")]
    TypingStart {
        /// Room name.
        room_name: String,
        /// Optional thread scope.
        #[serde(default)]
        thread_id: Option<Uuid>,
    },
    /// Stop a typing indicator.
    #[serde(rename = "typing:stop")]
    TypingStop {
        /// Room name.
        room_name: String,
        /// Optional thread scope.
        #[serde(default)]
        thread_id: Option<Uuid>,
    },
    /// Explicitly set presence status.
    #[serde(rename = "presence:update")]
    PresenceUpdate {
        /// Declared status.
        status: PresenceStatus,
        /// Free-form status text.
        #[serde(default)]
        custom_status: Option<String>,
        /// Emoji shown next to the status text.
        #[serde(default)]
        custom_emoji: Option<String>,
        /// Seconds until the override lapses on its own.
        #[serde(default)]
        expires_in_seconds: Option<i64>,
    },
    /// Heartbeat.
    #[serde(rename = "ping")]
    Ping {
        /// Client send time (epoch milliseconds), echoed in the pong.
        #[serde(default)]
        timestamp: Option<i64>,
        /// Round-trip latency the client measured on the previous ping.
        #[serde(default)]
        latency_ms: Option<i32>,
    },
}

/// Events sent by the server to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Handshake accepted.
    #[serde(rename = "connected")]
    Connected {
        /// Server-generated connection identifier.
        socket_id: Uuid,
        /// Server wall-clock time at accept.
        server_time: DateTime<Utc>,
        /// Protocol version string.
        protocol_version: String,
    },
    /// A user was resolved from the handshake credential.
    #[serde(rename = "authenticated")]
    Authenticated {
        /// The resolved user.
        user_id: Uuid,
        /// Session claim carried by the token, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<Uuid>,
    },
    /// Another member joined a room.
    #[serde(rename = "user:joined")]
    UserJoined {
        /// Room name.
        room_name: String,
        /// Joining user.
        user_id: Uuid,
    },
    /// A member left a room.
    #[serde(rename = "user:left")]
    UserLeft {
        /// Room name.
        room_name: String,
        /// Leaving user.
        user_id: Uuid,
    },
    /// A message published to a room the client is in.
    #[serde(rename = "message:new")]
    MessageNew {
        /// Room name.
        room_name: String,
        /// Sender.
        user_id: Uuid,
        /// Message body.
        content: String,
        /// Thread the message belongs to.
        #[serde(skip_serializing_if = "Option::is_none")]
        thread_id: Option<Uuid>,
        /// Server-assigned timestamp.
        timestamp: DateTime<Utc>,
        /// Opaque metadata as supplied by the sender.
        metadata: Metadata,
    },
    /// Current typists for a room/thread (full list, never a delta).
    #[serde(rename = "typing:event")]
    TypingEvent {
        /// Room name.
        room_name: String,
        /// Thread scope, when threaded.
        #[serde(skip_serializing_if = "Option::is_none")]
        thread_id: Option<Uuid>,
        /// Everyone currently typing, oldest first.
        users: Vec<Typist>,
    },
    /// A user's aggregate presence changed.
    #[serde(rename = "presence:changed")]
    PresenceChanged {
        /// The user.
        user_id: Uuid,
        /// New status.
        status: PresenceStatus,
        /// Custom status text, when set.
        #[serde(skip_serializing_if = "Option::is_none")]
        custom_status: Option<String>,
        /// Custom status emoji, when set.
        #[serde(skip_serializing_if = "Option::is_none")]
        custom_emoji: Option<String>,
    },
    /// Heartbeat reply.
    #[serde(rename = "pong")]
    Pong {
        /// The client's `ping` timestamp, or server time when absent.
        timestamp: i64,
    },
    /// Request acknowledgement, sent only when the client supplied an id.
    #[serde(rename = "ack")]
    Ack {
        /// The client-chosen request id.
        id: u64,
        /// Whether the operation applied.
        success: bool,
        /// Operation result, when the op returns data.
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        /// Failure description, when `success` is false.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorPayload>,
    },
    /// Unsolicited error event.
    #[serde(rename = "error")]
    Error {
        /// Protocol error code.
        code: ErrorCode,
        /// Human-readable description.
        message: String,
        /// Additional context.
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },
}

impl ServerMessage {
    /// Successful ack for a client request.
    pub fn ack_ok(id: u64, data: Option<serde_json::Value>) -> Self {
        Self::Ack {
            id,
            success: true,
            data,
            error: None,
        }
    }

    /// Failed ack for a client request.
    pub fn ack_err(id: u64, error: &AppError) -> Self {
        Self::Ack {
            id,
            success: false,
            data: None,
            error: Some(ErrorPayload::from_error(error)),
        }
    }

    /// Unsolicited error event for a failure without an ack id.
    pub fn error_event(error: &AppError) -> Self {
        Self::Error {
            code: ErrorCode::from_error(error),
            message: error.message.clone(),
            details: None,
        }
    }
}

/// One currently-typing user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Typist {
    /// The typing user.
    pub user_id: Uuid,
    /// When they started typing.
    pub started_at: DateTime<Utc>,
}

/// Structured failure carried inside a failed ack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Protocol error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Additional context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorPayload {
    /// Map an application error to its wire representation.
    pub fn from_error(error: &AppError) -> Self {
        Self {
            code: ErrorCode::from_error(error),
            message: error.message.clone(),
            details: None,
        }
    }
}

/// Closed set of protocol error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The operation requires an authenticated user.
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired,
    /// A credential was presented but failed validation.
    #[serde(rename = "INVALID_TOKEN")]
    InvalidToken,
    /// The named room does not exist or is inactive.
    #[serde(rename = "ROOM_NOT_FOUND")]
    RoomNotFound,
    /// Anything else; the message carries the specifics.
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl ErrorCode {
    /// Derive the wire code from an application error kind.
    pub fn from_error(error: &AppError) -> Self {
        match error.kind {
            ErrorKind::Authorization => Self::AuthRequired,
            ErrorKind::Authentication => Self::InvalidToken,
            ErrorKind::NotFound => Self::RoomNotFound,
            _ => Self::InternalError,
        }
    }

    /// The code as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
