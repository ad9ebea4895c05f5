use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::error::AppError;

/// Which persistence variant backs the two collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// JSON files in `--data-dir`, attachments in `--uploads-dir`.
    Local,
    /// MongoDB for records, an S3-compatible bucket for attachments.
    Managed,
}

/// Server configuration. Every flag can also be set from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "govdocs", version, about = "Document repository backend")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "GOVDOCS_ADDR", default_value = "0.0.0.0:3000")]
    pub addr: SocketAddr,

    /// Persistence variant for records and attachments.
    #[arg(long, env = "GOVDOCS_BACKEND", value_enum, default_value_t = Backend::Local)]
    pub backend: Backend,

    /// Directory holding `documents.json` and `archives.json` (local backend).
    #[arg(long, env = "GOVDOCS_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for uploaded attachments, served at `/uploads` (local backend).
    #[arg(long, env = "GOVDOCS_UPLOADS_DIR", default_value = "uploads")]
    pub uploads_dir: PathBuf,

    /// Optional site root served for any path not handled by the API.
    #[arg(long, env = "GOVDOCS_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Upper bound on a request body, attachment included.
    #[arg(long, env = "GOVDOCS_MAX_UPLOAD_BYTES", default_value_t = 25 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

/// MongoDB settings read from environment variables.
#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl MongoConfig {
    /// Required env vars:
    /// - `MONGO_URI`
    ///
    /// Optional:
    /// - `MONGO_DATABASE` (defaults to `GovDocsRepo`)
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            uri: require_env("MONGO_URI")?,
            database: std::env::var("MONGO_DATABASE")
                .unwrap_or_else(|_| "GovDocsRepo".to_string()),
        })
    }
}

/// S3 attachment settings read from environment variables.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    /// Custom endpoint for MinIO / LocalStack.
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// Key prefix ("folder") every attachment is written under.
    pub prefix: String,
    /// Public base URL of the bucket. When unset, attachments are served
    /// through `/api/attachments`.
    pub public_url: Option<String>,
}

impl S3Config {
    /// Required env vars:
    /// - `S3_BUCKET`
    ///
    /// Optional:
    /// - `S3_ENDPOINT`, `S3_REGION` (or the standard `AWS_REGION`)
    /// - `S3_PREFIX` (defaults to `GovDocsRepo`)
    /// - `S3_PUBLIC_URL`
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            bucket: require_env("S3_BUCKET")?,
            endpoint: optional_env("S3_ENDPOINT"),
            region: optional_env("S3_REGION"),
            prefix: std::env::var("S3_PREFIX").unwrap_or_else(|_| "GovDocsRepo".to_string()),
            public_url: optional_env("S3_PUBLIC_URL"),
        })
    }
}

fn require_env(name: &str) -> Result<String, AppError> {
    optional_env(name).ok_or_else(|| AppError::Config(format!("{name} not set")))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
