//! WebSocket upgrade handler.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use beacon_core::error::AppError;
use beacon_realtime::CloseReason;
use beacon_realtime::connection::AuthenticatedUser;

use crate::error::ApiError;
use crate::state::AppState;

/// Handshake query parameters.
#[derive(Debug, serde::Deserialize)]
pub struct WsQuery {
    /// JWT access token; alternative to the `Authorization` header.
    pub token: Option<String>,
    /// Client device descriptor, a JSON object.
    pub device: Option<String>,
}

/// GET /ws — WebSocket upgrade.
///
/// Authentication happens before the upgrade: a bad token, or a missing
/// one while anonymous access is disabled, rejects with 401 and no
/// connection state is created.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query.token.clone().or_else(|| bearer_token(&headers));
    let user = match token {
        Some(token) => Some(state.authenticator.authenticate(&token)?),
        None if state.config.auth.allow_anonymous => None,
        None => {
            return Err(AppError::authorization(
                "Authentication required: pass ?token= or an Authorization header",
            )
            .into());
        }
    };

    let device_info = query.device.as_deref().and_then(parse_device);
    let remote_addr = Some(addr.to_string());

    Ok(ws.on_upgrade(move |socket| serve_socket(state, socket, user, remote_addr, device_info)))
}

/// Drives one established WebSocket connection until either side ends it.
async fn serve_socket(
    state: AppState,
    socket: WebSocket,
    user: Option<AuthenticatedUser>,
    remote_addr: Option<String>,
    device_info: Option<serde_json::Value>,
) {
    let manager = state.engine.manager().clone();
    let (handle, mut outbound) = match manager.accept(user, remote_addr, device_info).await {
        Ok(accepted) => accepted,
        Err(e) => {
            warn!("Failed to register connection: {e}");
            return;
        }
    };
    let conn_id = handle.id;

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Failed to serialize outbound event: {e}");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => manager.handle_frame(conn_id, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            // Transport-level pings are answered by axum itself.
            Ok(_) => {}
            Err(e) => {
                debug!(%conn_id, "WebSocket transport error: {e}");
                break;
            }
        }
    }

    if let Err(e) = manager.close(conn_id, CloseReason::ClientDisconnect).await {
        warn!(%conn_id, "Failed to finalize connection close: {e}");
    }
    writer.abort();
}

/// Extracts a bearer token from the `Authorization` header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}

/// Parses the device descriptor; anything but a JSON object is ignored.
fn parse_device(raw: &str) -> Option<serde_json::Value> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if value.is_object() => Some(value),
        _ => {
            debug!("Ignoring device descriptor that is not a JSON object");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_the_scheme_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn device_descriptor_must_be_an_object() {
        assert!(parse_device(r#"{"os": "linux", "app": "beacon-web"}"#).is_some());
        assert!(parse_device(r#""just a string""#).is_none());
        assert!(parse_device("not json at all").is_none());
    }
}
