//! Structured sketch generation for the whiteboard UI.
//!
//! Requests a JSON-constrained completion and enforces the sketch
//! contract before returning it: malformed JSON is reported with the raw
//! text attached (`sketch_parse_failed`), a parsed document missing a
//! required top-level key is a distinct failure (`sketch_shape_invalid`).
//! Neither case ever yields a 200.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{chat::completion_error, error};
use crate::{
    server::AppState,
    upstream::{ChatMessage, CompletionRequest},
};

/// Required top-level keys of a generated sketch document.
const REQUIRED_KEYS: [&str; 2] = ["title", "elements"];

const SKETCH_SYSTEM_PROMPT: &str = "You are a tutoring whiteboard assistant. \
    Respond with a single JSON object containing a string field \"title\" and \
    an array field \"elements\" describing the drawing steps for the requested \
    sketch. Do not include any text outside the JSON object.";

#[derive(Debug, Deserialize)]
pub struct SketchRequest {
    #[serde(default)]
    pub prompt: String,
    pub hint: Option<String>,
    pub model: Option<String>,
}

/// `POST /v1/sketch` — JSON-constrained sketch generation.
pub async fn sketch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SketchRequest>,
) -> Response {
    if request.prompt.trim().is_empty() {
        return error::bad_request("missing_prompt", "prompt must be a non-empty string");
    }

    let mut messages = vec![ChatMessage {
        role: "system".to_string(),
        content: SKETCH_SYSTEM_PROMPT.to_string(),
    }];
    if let Some(hint) = &request.hint {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: format!("Sketch style hint: {hint}"),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: request.prompt.clone(),
    });

    let completion = CompletionRequest {
        messages,
        model: request.model.clone(),
        temperature: None,
    };

    let raw = match state.llm.complete_json(&completion).await {
        Ok(raw) => raw,
        Err(e) => return completion_error("sketch", e),
    };

    let value: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "sketch output failed to parse");
            return error::bad_gateway_with_detail(
                "sketch_parse_failed",
                "generated sketch was not valid JSON",
                raw,
            );
        }
    };

    for key in REQUIRED_KEYS {
        if value.get(key).is_none() {
            warn!(key, "sketch output missing required key");
            return error::bad_gateway(
                "sketch_shape_invalid",
                format!("generated sketch is missing required key '{key}'"),
            );
        }
    }

    (StatusCode::OK, Json(value)).into_response()
}
