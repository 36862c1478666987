//! Object-storage contracts for the upload facade.
//!
//! Handlers bind to the [`ObjectStore`] trait, never a concrete backend.
//! The filesystem implementation lives in [`fs`]; a hosted object store
//! would slot in behind the same contract.

mod fs;

pub use fs::FsObjectStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("upload ticket is malformed or tampered")]
    TicketInvalid,
    #[error("upload ticket has expired")]
    TicketExpired,
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// A signed, time-limited permission to upload one object.
#[derive(Debug, Clone, Serialize)]
pub struct UploadTicket {
    /// Relative URL the client PUTs the body to.
    pub url: String,
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Mint a signed upload ticket for `key`.
    fn sign_upload(&self, key: &str) -> Result<UploadTicket, StorageError>;

    /// Verify a ticket token and store `body` under its key.
    /// Returns the key the object was stored under.
    async fn accept_upload(&self, token: &str, body: &[u8]) -> Result<String, StorageError>;

    /// List stored objects, optionally under a folder prefix.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectMeta>, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn list_folders(&self) -> Result<Vec<String>, StorageError>;

    async fn create_folder(&self, name: &str) -> Result<(), StorageError>;

    /// Delete a folder and everything under it.
    async fn delete_folder(&self, name: &str) -> Result<(), StorageError>;
}
