//! WebSocket relay endpoint.
//!
//! Each connection runs one task that `select!`s between its inbound
//! socket frames and its outbound channel, which preserves per-sender
//! emission order. A disconnect, from either direction, is a normal
//! lifecycle event: the connection leaves its room and the task ends.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    event::RelayEvent,
    handshake::{Handshake, HandshakeQuery, RELAY_SUBPROTOCOL},
};
use crate::{routers::error, server::AppState};

/// `GET /ws?role=<desktop|mobile>&sid=<session>` — upgrade and join the
/// room named by the handshake.
pub async fn relay_upgrade(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if let Some(rejection) = reject_disallowed_origin(&state.config.cors_origins, &headers) {
        return rejection;
    }
    let handshake = Handshake::from_query(query);
    ws.protocols([RELAY_SUBPROTOCOL])
        .on_upgrade(move |socket| relay_connection(state, handshake, socket))
}

/// CORS response headers cannot stop a WebSocket upgrade (browsers never
/// preflight it), so the allow-list is checked here before upgrading.
/// Requests without an `Origin` header come from non-browser clients and
/// pass through.
fn reject_disallowed_origin(allowed: &[String], headers: &HeaderMap) -> Option<Response> {
    if allowed.is_empty() {
        return None;
    }
    let value = headers.get(header::ORIGIN)?;
    let origin = value.to_str().unwrap_or("");
    if allowed.iter().any(|entry| entry == origin) {
        return None;
    }
    warn!(origin, "relay upgrade rejected: origin not in allow-list");
    Some(error::create_error(
        StatusCode::FORBIDDEN,
        "origin_not_allowed",
        "origin is not permitted to open a relay connection",
    ))
}

async fn relay_connection(state: Arc<AppState>, handshake: Handshake, socket: WebSocket) {
    let room = handshake.room_name();
    let conn = handshake.conn_id;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let members = state.rooms.join(&room, conn, tx);
    info!(
        room = %room,
        role = handshake.role.as_str(),
        conn = %conn,
        members,
        "relay join"
    );

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(msg) => {
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(msg)) => {
                    if !forward(&state, &room, conn, msg) {
                        break;
                    }
                }
                // A receive error is treated like a close, never escalated.
                Some(Err(_)) | None => break,
            },
        }
    }

    state.rooms.leave(&room, conn);
    info!(room = %room, conn = %conn, "relay leave");
}

/// Forward one inbound message to room peers, verbatim. Returns `false`
/// when the connection should wind down.
fn forward(state: &AppState, room: &str, conn: Uuid, msg: Message) -> bool {
    match msg {
        Message::Text(text) => {
            match RelayEvent::peek_name(text.as_str()) {
                Some(name) => debug!(room, conn = %conn, event = %name, "relay forward"),
                None => debug!(room, conn = %conn, "relay forward (unparsed)"),
            }
            state.rooms.broadcast(room, conn, &Message::Text(text));
            true
        }
        Message::Binary(data) => {
            debug!(room, conn = %conn, bytes = data.len(), "relay forward binary");
            state.rooms.broadcast(room, conn, &Message::Binary(data));
            true
        }
        Message::Close(_) => false,
        // axum answers pings itself; nothing to fan out.
        Message::Ping(_) | Message::Pong(_) => true,
    }
}
