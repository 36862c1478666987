use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tutor_gateway::{
    config::{AppConfig, LlmConfig, StorageConfig},
    server,
};

/// Backend gateway for the tutoring whiteboard application.
#[derive(Debug, Parser)]
#[command(name = "tutor-gateway", version, about)]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0", env = "TUTOR_HOST")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3100, env = "TUTOR_PORT")]
    port: u16,

    /// Allowed CORS origins, comma separated. Empty allows any origin.
    #[arg(long = "cors-origin", env = "TUTOR_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Base URL of the OpenAI-compatible completion API.
    #[arg(
        long,
        default_value = "https://api.openai.com/v1",
        env = "TUTOR_LLM_BASE_URL"
    )]
    llm_base_url: String,

    /// API key for the completion API.
    #[arg(long, env = "TUTOR_LLM_API_KEY")]
    llm_api_key: Option<String>,

    /// Default model for requests that do not name one.
    #[arg(long, default_value = "gpt-4o-mini", env = "TUTOR_LLM_MODEL")]
    llm_model: String,

    /// Upstream request timeout in seconds.
    #[arg(long, default_value_t = 120, env = "TUTOR_LLM_TIMEOUT_SECS")]
    llm_timeout_secs: u64,

    /// Root directory for stored uploads.
    #[arg(long, default_value = "./data/uploads", env = "TUTOR_STORAGE_ROOT")]
    storage_root: PathBuf,

    /// Secret used to sign upload tickets.
    #[arg(
        long,
        default_value = "dev-only-ticket-secret",
        env = "TUTOR_TICKET_SECRET"
    )]
    ticket_secret: String,

    /// Upload ticket lifetime in seconds.
    #[arg(long, default_value_t = 900, env = "TUTOR_TICKET_TTL_SECS")]
    ticket_ttl_secs: u64,

    /// Maximum request body size in bytes.
    #[arg(long, default_value_t = 8 * 1024 * 1024, env = "TUTOR_MAX_BODY_BYTES")]
    max_body_bytes: usize,
}

impl Cli {
    fn into_config(self) -> AppConfig {
        AppConfig {
            host: self.host,
            port: self.port,
            cors_origins: self.cors_origins,
            max_body_bytes: self.max_body_bytes,
            llm: LlmConfig {
                base_url: self.llm_base_url,
                api_key: self.llm_api_key,
                model: self.llm_model,
                request_timeout: Duration::from_secs(self.llm_timeout_secs),
            },
            storage: StorageConfig {
                root: self.storage_root,
                ticket_secret: self.ticket_secret,
                ticket_ttl: Duration::from_secs(self.ticket_ttl_secs),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    server::serve(cli.into_config()).await
}
