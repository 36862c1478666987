//! Gateway configuration, validated once at startup.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("llm base URL must start with http:// or https://, got '{0}'")]
    InvalidLlmBaseUrl(String),
    #[error("invalid CORS origin '{0}'")]
    InvalidCorsOrigin(String),
    #[error("ticket secret must not be empty")]
    EmptyTicketSecret,
    #[error("max body size must be greater than zero")]
    ZeroBodyLimit,
}

/// Upstream completion API settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: Option<String>,
    /// Default model for requests that do not name one.
    pub model: String,
    pub request_timeout: Duration,
}

/// Object-store settings for the upload facade.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for stored uploads.
    pub root: PathBuf,
    /// Secret used to key upload-ticket MACs.
    pub ticket_secret: String,
    /// Lifetime of a signed upload ticket.
    pub ticket_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
    /// Request body cap applied to all HTTP routes.
    pub max_body_bytes: usize,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = &self.llm.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidLlmBaseUrl(base.clone()));
        }
        for origin in &self.cors_origins {
            if origin.parse::<http::HeaderValue>().is_err() {
                return Err(ConfigError::InvalidCorsOrigin(origin.clone()));
            }
        }
        if self.storage.ticket_secret.is_empty() {
            return Err(ConfigError::EmptyTicketSecret);
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::ZeroBodyLimit);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 3100,
            cors_origins: Vec::new(),
            max_body_bytes: 8 * 1024 * 1024,
            llm: LlmConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                model: "gpt-4o-mini".to_string(),
                request_timeout: Duration::from_secs(120),
            },
            storage: StorageConfig {
                root: PathBuf::from("/tmp/uploads"),
                ticket_secret: "secret".to_string(),
                ticket_ttl: Duration::from_secs(900),
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut config = base_config();
        config.llm.base_url = "ftp://example.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLlmBaseUrl(_))
        ));
    }

    #[test]
    fn rejects_unparseable_origin() {
        let mut config = base_config();
        config.cors_origins = vec!["https://ok.example".to_string(), "bad\norigin".to_string()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCorsOrigin(_))
        ));
    }

    #[test]
    fn rejects_empty_ticket_secret() {
        let mut config = base_config();
        config.storage.ticket_secret = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyTicketSecret)
        ));
    }
}
