use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::api::rate_limit::DEFAULT_PER_MINUTE;

pub const DEFAULT_ARTIFACT_DIR: &str = "data";

/// Load `.env.local` then `.env`; values already in the environment win.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

/// Shared subscriber setup for every binary. `RUST_LOG` narrows or widens it.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

#[derive(Debug, Clone, Parser)]
#[command(name = "wc26_predictor")]
#[command(about = "Serve World Cup match outcome predictions over HTTP", long_about = None)]
pub struct ServerConfig {
    /// Host to bind to
    #[arg(long, env = "WC26_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "WC26_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory holding rf_model.json and team_mapping.json
    #[arg(long = "artifacts", env = "WC26_ARTIFACT_DIR", default_value = DEFAULT_ARTIFACT_DIR)]
    pub artifact_dir: PathBuf,

    /// Allowed POST /predict calls per client IP per minute
    #[arg(long = "rate-limit", env = "WC26_RATE_LIMIT_PER_MINUTE", default_value_t = DEFAULT_PER_MINUTE)]
    pub rate_limit_per_minute: u32,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
