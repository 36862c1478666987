//! Filesystem-backed object store with blake3-signed upload tickets.
//!
//! A ticket token is `base64url(key|expiry-unix) . hex(mac)` where the MAC
//! is a keyed blake3 hash of the payload. Verification re-derives the MAC,
//! compares hashes of the two strings (constant-time via `blake3::Hash`
//! equality), then checks expiry and key hygiene.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use tokio::fs;
use tracing::debug;

use super::{ObjectMeta, ObjectStore, StorageError, UploadTicket};
use crate::config::StorageConfig;

/// Upper bound on object key length.
const MAX_KEY_LEN: usize = 1024;

pub struct FsObjectStore {
    root: PathBuf,
    secret: [u8; 32],
    ticket_ttl: Duration,
}

impl FsObjectStore {
    pub fn new(config: &StorageConfig) -> Self {
        // Stretch the configured secret into a fixed-size MAC key.
        let secret = *blake3::hash(config.ticket_secret.as_bytes()).as_bytes();
        let ticket_ttl =
            Duration::from_std(config.ticket_ttl).unwrap_or_else(|_| Duration::minutes(15));
        Self {
            root: config.root.clone(),
            secret,
            ticket_ttl,
        }
    }

    fn mac(&self, payload: &str) -> String {
        blake3::keyed_hash(&self.secret, payload.as_bytes())
            .to_hex()
            .to_string()
    }

    fn mint_token(&self, key: &str, expires_at: DateTime<Utc>) -> String {
        let payload = format!("{key}|{}", expires_at.timestamp());
        let encoded = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        format!("{encoded}.{}", self.mac(&payload))
    }

    /// Decode and verify a ticket token; returns the object key.
    fn verify_token(&self, token: &str, now: DateTime<Utc>) -> Result<String, StorageError> {
        let (encoded, mac) = token.split_once('.').ok_or(StorageError::TicketInvalid)?;
        let payload_bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| StorageError::TicketInvalid)?;
        let payload = String::from_utf8(payload_bytes).map_err(|_| StorageError::TicketInvalid)?;

        let expected = self.mac(&payload);
        if blake3::hash(mac.as_bytes()) != blake3::hash(expected.as_bytes()) {
            return Err(StorageError::TicketInvalid);
        }

        let (key, expiry) = payload.rsplit_once('|').ok_or(StorageError::TicketInvalid)?;
        let expiry: i64 = expiry.parse().map_err(|_| StorageError::TicketInvalid)?;
        if now.timestamp() > expiry {
            return Err(StorageError::TicketExpired);
        }
        validate_key(key)?;
        Ok(key.to_string())
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn sign_upload(&self, key: &str) -> Result<UploadTicket, StorageError> {
        validate_key(key)?;
        let expires_at = Utc::now() + self.ticket_ttl;
        let token = self.mint_token(key, expires_at);
        Ok(UploadTicket {
            url: format!("/v1/uploads/put/{token}"),
            key: key.to_string(),
            expires_at,
        })
    }

    async fn accept_upload(&self, token: &str, body: &[u8]) -> Result<String, StorageError> {
        let key = self.verify_token(token, Utc::now())?;
        let path = self.resolve(&key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, body).await?;
        debug!(key = %key, bytes = body.len(), "stored upload");
        Ok(key)
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectMeta>, StorageError> {
        let start = match prefix {
            Some(folder) => {
                validate_key(folder)?;
                self.root.join(folder)
            }
            None => self.root.clone(),
        };

        let mut items = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    pending.push(entry.path());
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&self.root).map(Path::to_path_buf)
                else {
                    continue;
                };
                let key = relative.to_string_lossy().replace('\\', "/");
                let last_modified = meta
                    .modified()
                    .map(DateTime::from)
                    .unwrap_or_else(|_| Utc::now());
                items.push(ObjectMeta {
                    key,
                    size: meta.len(),
                    last_modified,
                });
            }
        }
        items.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(items)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_folders(&self) -> Result<Vec<String>, StorageError> {
        let mut folders = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(folders),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.metadata().await?.is_dir() {
                folders.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        folders.sort();
        Ok(folders)
    }

    async fn create_folder(&self, name: &str) -> Result<(), StorageError> {
        validate_folder_name(name)?;
        fs::create_dir_all(self.root.join(name)).await?;
        Ok(())
    }

    async fn delete_folder(&self, name: &str) -> Result<(), StorageError> {
        validate_folder_name(name)?;
        match fs::remove_dir_all(self.root.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Keys are relative paths of plain segments: no absolute paths, no `..`,
/// no empty keys.
fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    for component in Path::new(key).components() {
        match component {
            Component::Normal(_) => {}
            _ => return Err(StorageError::InvalidKey(key.to_string())),
        }
    }
    Ok(())
}

/// Folders are single path segments.
fn validate_folder_name(name: &str) -> Result<(), StorageError> {
    validate_key(name)?;
    if name.contains('/') {
        return Err(StorageError::InvalidKey(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            root: dir.path().to_path_buf(),
            ticket_secret: "test-secret".to_string(),
            ticket_ttl: StdDuration::from_secs(60),
        };
        let store = FsObjectStore::new(&config);
        (dir, store)
    }

    #[tokio::test]
    async fn sign_upload_list_delete_roundtrip() {
        let (_dir, store) = store();

        let ticket = store.sign_upload("algebra/notes.png").unwrap();
        assert!(ticket.url.starts_with("/v1/uploads/put/"));
        let token = ticket.url.rsplit('/').next().unwrap();

        let key = store.accept_upload(token, b"pixels").await.unwrap();
        assert_eq!(key, "algebra/notes.png");

        let items = store.list(Some("algebra")).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key, "algebra/notes.png");
        assert_eq!(items[0].size, 6);

        store.delete("algebra/notes.png").await.unwrap();
        assert!(store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let (_dir, store) = store();
        let ticket = store.sign_upload("a.txt").unwrap();
        let token = ticket.url.rsplit('/').next().unwrap();
        let mut tampered = token.to_string();
        let flipped = if tampered.ends_with('0') { '1' } else { '0' };
        tampered.pop();
        tampered.push(flipped);

        assert!(matches!(
            store.accept_upload(&tampered, b"x").await,
            Err(StorageError::TicketInvalid)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let (_dir, store) = store();
        let past = Utc::now() - Duration::minutes(5);
        let token = store.mint_token("a.txt", past);
        assert!(matches!(
            store.verify_token(&token, Utc::now()),
            Err(StorageError::TicketExpired)
        ));
    }

    #[test]
    fn traversal_keys_are_rejected() {
        assert!(matches!(
            validate_key("../etc/passwd"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            validate_key("/abs/path"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            validate_key("a/../b"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(validate_key(""), Err(StorageError::InvalidKey(_))));
        assert!(validate_key("folder/file.png").is_ok());
    }

    #[tokio::test]
    async fn delete_missing_object_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.delete("missing.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn folder_lifecycle() {
        let (_dir, store) = store();
        store.create_folder("geometry").await.unwrap();
        assert_eq!(store.list_folders().await.unwrap(), vec!["geometry"]);

        assert!(matches!(
            store.create_folder("a/b").await,
            Err(StorageError::InvalidKey(_))
        ));

        store.delete_folder("geometry").await.unwrap();
        assert!(store.list_folders().await.unwrap().is_empty());
        assert!(matches!(
            store.delete_folder("geometry").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
