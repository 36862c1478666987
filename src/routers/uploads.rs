//! Upload and folder management over the object store.
//!
//! Thin handlers: validate shape, delegate to the [`ObjectStore`] handle,
//! map [`StorageError`] onto the error taxonomy. The signed-URL flow is
//! two steps: `sign` mints a ticket, the client PUTs the body to the
//! ticket's URL.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::error;
use crate::{server::AppState, storage::StorageError};

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    #[serde(default)]
    pub filename: String,
    pub folder: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub folder: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FolderRequest {
    #[serde(default)]
    pub name: String,
}

/// `POST /v1/uploads/sign` — mint a signed upload ticket.
pub async fn sign_upload(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignRequest>,
) -> Response {
    if request.filename.trim().is_empty() {
        return error::bad_request("missing_filename", "filename must be a non-empty string");
    }
    let key = match request.folder.as_deref().map(str::trim) {
        Some(folder) if !folder.is_empty() => {
            format!("{}/{}", folder.trim_matches('/'), request.filename)
        }
        _ => request.filename.clone(),
    };
    match state.store.sign_upload(&key) {
        Ok(ticket) => (StatusCode::OK, Json(ticket)).into_response(),
        Err(e) => storage_error(e),
    }
}

/// `PUT /v1/uploads/put/{token}` — accept a body against an issued ticket.
pub async fn put_upload(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    body: Bytes,
) -> Response {
    match state.store.accept_upload(&token, &body).await {
        Ok(key) => (
            StatusCode::OK,
            Json(json!({ "key": key, "size": body.len() })),
        )
            .into_response(),
        Err(e) => storage_error(e),
    }
}

/// `GET /v1/uploads?folder=` — list stored objects.
pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    match state.store.list(query.folder.as_deref()).await {
        Ok(items) => (StatusCode::OK, Json(json!({ "items": items }))).into_response(),
        Err(e) => storage_error(e),
    }
}

/// `DELETE /v1/uploads/{*key}` — delete one object.
pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Response {
    match state.store.delete(&key).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "deleted": key }))).into_response(),
        Err(e) => storage_error(e),
    }
}

/// `GET /v1/folders`
pub async fn list_folders(State(state): State<Arc<AppState>>) -> Response {
    match state.store.list_folders().await {
        Ok(folders) => (StatusCode::OK, Json(json!({ "folders": folders }))).into_response(),
        Err(e) => storage_error(e),
    }
}

/// `POST /v1/folders`
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FolderRequest>,
) -> Response {
    if request.name.trim().is_empty() {
        return error::bad_request("missing_name", "name must be a non-empty string");
    }
    match state.store.create_folder(&request.name).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "created": request.name }))).into_response(),
        Err(e) => storage_error(e),
    }
}

/// `DELETE /v1/folders/{name}`
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    match state.store.delete_folder(&name).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "deleted": name }))).into_response(),
        Err(e) => storage_error(e),
    }
}

fn storage_error(err: StorageError) -> Response {
    match err {
        StorageError::InvalidKey(key) => {
            error::bad_request("invalid_key", format!("invalid object key: {key}"))
        }
        StorageError::NotFound(key) => {
            error::not_found("not_found", format!("no such object: {key}"))
        }
        StorageError::TicketInvalid => {
            error::bad_request("ticket_invalid", "upload ticket is malformed or tampered")
        }
        StorageError::TicketExpired => {
            error::bad_request("ticket_expired", "upload ticket has expired")
        }
        StorageError::Io(e) => {
            error!(error = %e, "storage io failure");
            error::internal_error("storage_io", "storage operation failed")
        }
    }
}
