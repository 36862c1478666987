//! Shared test harness: boots the gateway on an ephemeral port against a
//! mock completion upstream and a temp storage root.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

use tutor_gateway::{
    config::{AppConfig, LlmConfig, StorageConfig},
    server::{build_app, AppState},
};

pub type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Canned behavior for the mock completion upstream.
#[derive(Clone)]
pub enum UpstreamMode {
    /// JSON body returned with a 200.
    Json(Value),
    /// Raw body with explicit status and content type.
    Raw {
        status: u16,
        content_type: &'static str,
        body: String,
    },
}

impl UpstreamMode {
    /// A completion whose first choice carries `content`.
    pub fn content(content: &str) -> Self {
        Self::Json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }
}

#[derive(Clone)]
struct MockUpstream {
    mode: UpstreamMode,
}

async fn completions(State(mock): State<MockUpstream>, Json(_request): Json<Value>) -> Response {
    match mock.mode {
        UpstreamMode::Json(value) => Json(value).into_response(),
        UpstreamMode::Raw {
            status,
            content_type,
            body,
        } => (
            StatusCode::from_u16(status).unwrap(),
            [(header::CONTENT_TYPE, content_type)],
            body,
        )
            .into_response(),
    }
}

async fn spawn_router(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub async fn spawn_upstream(mode: UpstreamMode) -> SocketAddr {
    let app = Router::new()
        .route("/chat/completions", post(completions))
        .with_state(MockUpstream { mode });
    spawn_router(app).await
}

pub struct TestApp {
    pub addr: SocketAddr,
    // Kept alive so the storage root survives the test.
    _storage_dir: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/ws?{query}", self.addr)
    }
}

pub async fn spawn_gateway(upstream: SocketAddr) -> TestApp {
    spawn_gateway_with_origins(upstream, Vec::new()).await
}

/// Gateway with a non-empty origin allow-list, for relay origin tests.
pub async fn spawn_gateway_with_origins(
    upstream: SocketAddr,
    cors_origins: Vec<String>,
) -> TestApp {
    let storage_dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins,
        max_body_bytes: 8 * 1024 * 1024,
        llm: LlmConfig {
            base_url: format!("http://{upstream}"),
            api_key: None,
            model: "test-model".to_string(),
            request_timeout: Duration::from_secs(5),
        },
        storage: StorageConfig {
            root: storage_dir.path().to_path_buf(),
            ticket_secret: "test-secret".to_string(),
            ticket_ttl: Duration::from_secs(60),
        },
    };
    let state = Arc::new(AppState::new(config).unwrap());
    let addr = spawn_router(build_app(state)).await;
    TestApp {
        addr,
        _storage_dir: storage_dir,
    }
}

/// Gateway with a trivial upstream, for tests that never call it.
pub async fn spawn_default_gateway() -> TestApp {
    let upstream = spawn_upstream(UpstreamMode::content("unused")).await;
    spawn_gateway(upstream).await
}

pub async fn connect_ws(app: &TestApp, query: &str) -> WsClient {
    let (ws, _response) = connect_async(app.ws_url(query)).await.unwrap();
    // Give the server a beat to finish the join before peers send.
    tokio::time::sleep(Duration::from_millis(50)).await;
    ws
}

pub async fn send_text(ws: &mut WsClient, text: &str) {
    ws.send(Message::Text(text.to_string().into()))
        .await
        .unwrap();
}

/// Receive the next text frame within `wait`, or `None` on timeout/close.
pub async fn recv_text(ws: &mut WsClient, wait: Duration) -> Option<String> {
    loop {
        match tokio::time::timeout(wait, ws.next()).await {
            Ok(Some(Ok(msg))) if msg.is_text() => {
                return Some(msg.into_text().unwrap().to_string());
            }
            // Skip pings and other non-text frames.
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        }
    }
}
