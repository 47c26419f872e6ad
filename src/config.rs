//! Service configuration, read once at start-up from flags or the environment.
use crate::database::identifier::validate;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Default request body limit: 25 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid schema name '{0}': only a-z, 0-9 and '_' are allowed")]
    InvalidSchema(String),

    #[error("API_KEY must be set unless authentication is disabled")]
    MissingApiKey,
}

#[derive(Parser, Clone, Debug)]
#[command(name = "sheet-ingest", version, about = "Loads uploaded Excel workbooks into DuckDB tables")]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, env = "SHEET_INGEST_LISTEN", default_value = "127.0.0.1:5005")]
    pub listen: SocketAddr,

    /// DuckDB database file
    #[arg(long, env = "SHEET_INGEST_DATABASE", default_value = "sheet_ingest.duckdb")]
    pub database: PathBuf,

    /// Schema that uploaded tables are created in
    #[arg(long, env = "DB_SCHEMA", default_value = "main")]
    pub schema: String,

    /// Directory for temporary upload files
    #[arg(long, env = "SHEET_INGEST_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Rows per committed transaction; 0 loads each upload atomically
    #[arg(long, env = "SHEET_INGEST_BATCH_SIZE", default_value_t = 0)]
    pub batch_size: usize,

    /// Maximum accepted request body in bytes
    #[arg(long, env = "SHEET_INGEST_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Bearer token required on /api routes
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Serve /api routes without authentication
    #[arg(long, env = "SHEET_INGEST_DISABLE_AUTH")]
    pub disable_auth: bool,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate(&self.schema).map_err(|_| ConfigError::InvalidSchema(self.schema.to_owned()))?;
        let has_key = self.api_key.as_deref().map(|key| !key.trim().is_empty()).unwrap_or(false);
        if !self.disable_auth && !has_key {
            Err(ConfigError::MissingApiKey)?
        }
        Ok(())
    }
}
