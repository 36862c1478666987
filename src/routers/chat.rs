//! Chat completion facade: blocking and streamed variants.

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use super::error;
use crate::{
    server::AppState,
    upstream::{ChatMessage, CompletionRequest, LlmError},
};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

/// `POST /v1/chat` — blocking completion, returns `{"text": ...}`.
pub async fn chat(State(state): State<Arc<AppState>>, Json(request): Json<ChatRequest>) -> Response {
    let completion = match validate(&request) {
        Ok(completion) => completion,
        Err(response) => return response,
    };
    match state.llm.complete(&completion).await {
        Ok(text) => (StatusCode::OK, Json(json!({ "text": text }))).into_response(),
        Err(e) => completion_error("chat", e),
    }
}

/// `POST /v1/chat/stream` — raw incremental text stream. The client
/// consumes bytes as they arrive; there are no message boundaries, and a
/// mid-stream upstream failure ends the stream silently (the framing is
/// already committed).
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let completion = match validate(&request) {
        Ok(completion) => completion,
        Err(response) => return response,
    };
    let fragments = match state.llm.complete_stream(&completion).await {
        Ok(stream) => stream,
        Err(e) => return completion_error("chat_stream", e),
    };

    let body = Body::from_stream(
        fragments
            .inspect(|item| {
                if let Err(e) = item {
                    warn!(error = %e, "terminating chat stream after upstream failure");
                }
            })
            .take_while(|item| futures_util::future::ready(item.is_ok()))
            .map(|item| Ok::<_, Infallible>(Bytes::from(item.unwrap_or_default().into_bytes()))),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .unwrap_or_else(|e| {
            error!("failed to build streaming response: {e}");
            error::internal_error("response_build_failed", "failed to build response")
        })
}

fn validate(request: &ChatRequest) -> Result<CompletionRequest, Response> {
    if request.messages.is_empty() {
        return Err(error::bad_request(
            "missing_messages",
            "messages must be a non-empty array",
        ));
    }
    for (index, message) in request.messages.iter().enumerate() {
        if message.role.is_empty() {
            return Err(error::bad_request(
                "invalid_message",
                format!("messages[{index}].role must not be empty"),
            ));
        }
    }
    Ok(CompletionRequest {
        messages: request.messages.clone(),
        model: request.model.clone(),
        temperature: request.temperature,
    })
}

/// Map an upstream client error onto the facade's error taxonomy.
pub(crate) fn completion_error(op: &str, err: LlmError) -> Response {
    match err {
        LlmError::Upstream { status, body } => {
            error!(op, %status, "upstream completion error");
            error::bad_gateway_with_detail(
                "upstream_error",
                format!("completion service returned {status}"),
                body,
            )
        }
        LlmError::MissingContent => {
            error!(op, "upstream response missing content");
            error::bad_gateway("upstream_empty", "completion service returned no content")
        }
        e => {
            error!(op, error = %e, "completion request failed");
            error::bad_gateway("upstream_unreachable", e.to_string())
        }
    }
}
