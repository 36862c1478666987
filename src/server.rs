//! Application state, router assembly, and the serve loop.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    http::HeaderValue,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    config::AppConfig,
    relay::{registry::RoomRegistry, ws::relay_upgrade},
    routers::{chat, sketch, uploads},
    storage::{FsObjectStore, ObjectStore},
    upstream::LlmClient,
};

pub struct AppState {
    pub config: AppConfig,
    pub rooms: RoomRegistry,
    pub llm: LlmClient,
    pub store: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let llm = LlmClient::new(config.llm.clone())?;
        let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(&config.storage));
        Ok(Self {
            rooms: RoomRegistry::new(),
            llm,
            store,
            config,
        })
    }
}

pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(relay_upgrade))
        .route("/v1/chat", post(chat::chat))
        .route("/v1/chat/stream", post(chat::chat_stream))
        .route("/v1/sketch", post(sketch::sketch))
        .route("/v1/uploads/sign", post(uploads::sign_upload))
        .route("/v1/uploads/put/{token}", put(uploads::put_upload))
        .route("/v1/uploads", get(uploads::list_uploads))
        .route("/v1/uploads/{*key}", delete(uploads::delete_upload))
        .route(
            "/v1/folders",
            get(uploads::list_folders).post(uploads::create_folder),
        )
        .route("/v1/folders/{name}", delete(uploads::delete_folder))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        // Default: any origin.
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let list: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(list))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(config)?);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "tutor-gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use std::{path::PathBuf, time::Duration};
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let config = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: Vec::new(),
            max_body_bytes: 1024 * 1024,
            llm: crate::config::LlmConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                api_key: None,
                model: "test-model".to_string(),
                request_timeout: Duration::from_secs(1),
            },
            storage: crate::config::StorageConfig {
                root: PathBuf::from("/tmp/tutor-gateway-test"),
                ticket_secret: "test".to_string(),
                ticket_ttl: Duration::from_secs(60),
            },
        };
        Arc::new(AppState::new(config).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = build_app(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn chat_without_messages_is_rejected() {
        let app = build_app(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/chat")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get(crate::routers::error::HEADER_ERROR_CODE)
                .unwrap(),
            "missing_messages"
        );
    }
}
