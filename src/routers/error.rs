//! JSON error responses shared by all HTTP handlers.
//!
//! Every error body has the shape
//! `{"error": {"type", "code", "message", "detail?"}}` with the code
//! mirrored into the `X-Tutor-Error-Code` header so clients and proxies
//! can branch without parsing the body.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    #[serde(rename = "type")]
    error_type: &'static str,
    code: &'a str,
    message: &'a str,
    /// Raw diagnostic payload, e.g. unparsed upstream output.
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

pub const HEADER_ERROR_CODE: &str = "X-Tutor-Error-Code";

pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::BAD_REQUEST, code, message)
}

pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::NOT_FOUND, code, message)
}

pub fn internal_error(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::INTERNAL_SERVER_ERROR, code, message)
}

pub fn bad_gateway(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::BAD_GATEWAY, code, message)
}

/// Bad-gateway variant carrying a raw diagnostic payload in `detail`.
pub fn bad_gateway_with_detail(
    code: impl Into<String>,
    message: impl Into<String>,
    detail: impl Into<String>,
) -> Response {
    create_error_with_detail(StatusCode::BAD_GATEWAY, code, message, Some(detail.into()))
}

pub fn create_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> Response {
    create_error_with_detail(status, code, message, None)
}

pub fn create_error_with_detail(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
    detail: Option<String>,
) -> Response {
    let code_str = code.into();
    let message_str = message.into();

    let mut headers = HeaderMap::with_capacity(1);
    if let Ok(val) = HeaderValue::from_str(&code_str) {
        headers.insert(HEADER_ERROR_CODE, val);
    }

    (
        status,
        headers,
        Json(ErrorResponse {
            error: ErrorDetail {
                error_type: status_code_to_str(status),
                code: &code_str,
                message: &message_str,
                detail: detail.as_deref(),
            },
        }),
    )
        .into_response()
}

fn status_code_to_str(status_code: StatusCode) -> &'static str {
    status_code
        .canonical_reason()
        .unwrap_or("Unknown Status Code")
}
