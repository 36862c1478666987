//! Client for the hosted OpenAI-compatible chat completion API.
//!
//! Three call shapes: blocking (`complete`), incremental text fragments
//! (`complete_stream`), and JSON-constrained (`complete_json`, which
//! returns the raw text for the caller to parse). No retries: every
//! failure surfaces once.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::LlmConfig;

/// Cap on captured upstream error bodies.
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Cap on the SSE reassembly buffer, in case upstream stops sending
/// line delimiters.
const MAX_SSE_BUFFER: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Upstream { status: StatusCode, body: String },
    #[error("upstream response carried no message content")]
    MissingContent,
    #[error("upstream stream exceeded the reassembly buffer limit")]
    BufferOverflow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Overrides the configured default model when set.
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// Blocking completion: the primary text of the first choice.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = self.request_body(request, false, false);
        let response = self.send_checked(&body).await?;
        let value: Value = response.json().await?;
        extract_message_content(&value).ok_or(LlmError::MissingContent)
    }

    /// JSON-constrained completion: raw text for the caller to parse.
    pub async fn complete_json(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = self.request_body(request, false, true);
        let response = self.send_checked(&body).await?;
        let value: Value = response.json().await?;
        extract_message_content(&value).ok_or(LlmError::MissingContent)
    }

    /// Streaming completion: yields text fragments as the upstream emits
    /// them, ending after the `[DONE]` sentinel.
    pub async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<impl Stream<Item = Result<String, LlmError>> + Send + 'static, LlmError> {
        let body = self.request_body(request, true, false);
        let response = self.send_checked(&body).await?;
        debug!(status = %response.status(), "upstream stream open");
        Ok(decode_delta_stream(response.bytes_stream()))
    }

    fn request_body(&self, request: &CompletionRequest, stream: bool, json_mode: bool) -> Value {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());
        let mut body = json!({
            "model": model,
            "messages": request.messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if stream {
            body["stream"] = json!(true);
        }
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    async fn send_checked(&self, body: &Value) -> Result<reqwest::Response, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut request = self.http.post(url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = read_body_capped(response).await;
            return Err(LlmError::Upstream { status, body });
        }
        Ok(response)
    }
}

fn extract_message_content(value: &Value) -> Option<String> {
    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
        .map(str::to_owned)
}

async fn read_body_capped(response: reqwest::Response) -> String {
    match response.bytes().await {
        Ok(bytes) => {
            let capped = &bytes[..bytes.len().min(MAX_ERROR_BODY)];
            String::from_utf8_lossy(capped).into_owned()
        }
        Err(_) => String::new(),
    }
}

fn decode_delta_stream(
    upstream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = Result<String, LlmError>> + Send + 'static {
    let mut decoder = SseDecoder::new();
    upstream.flat_map(move |chunk| {
        let items: Vec<Result<String, LlmError>> = match chunk {
            Ok(bytes) => match decoder.feed(&bytes) {
                Ok(fragments) => fragments.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            },
            Err(e) => vec![Err(LlmError::Transport(e))],
        };
        futures::stream::iter(items)
    })
}

/// Incremental decoder for `text/event-stream` completion chunks:
/// reassembles lines across network chunk boundaries, extracts
/// `choices[0].delta.content`, and stops at `[DONE]`.
///
/// The buffer holds raw bytes; decoding to text happens only on complete
/// newline-terminated lines. Network chunk boundaries are arbitrary and
/// can land inside a multi-byte UTF-8 sequence.
struct SseDecoder {
    buf: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            done: false,
        }
    }

    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, LlmError> {
        if self.done {
            return Ok(Vec::new());
        }
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > MAX_SSE_BUFFER {
            return Err(LlmError::BufferOverflow);
        }

        let mut fragments = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim();
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();
            if data == "[DONE]" {
                self.done = true;
                break;
            }
            // Undecodable chunks are skipped, not fatal; upstream keep-alive
            // comments land here too.
            if let Ok(value) = serde_json::from_str::<Value>(data) {
                if let Some(text) = value
                    .pointer("/choices/0/delta/content")
                    .and_then(Value::as_str)
                {
                    if !text.is_empty() {
                        fragments.push(text.to_string());
                    }
                }
            }
        }
        Ok(fragments)
    }
}
