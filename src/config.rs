//! Configuration loading and types for Teledrop.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: networking, operator authentication, metadata persistence,
//! blob storage, upload limits, and slug generation.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Operator authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Metadata store settings.
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Blob storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Upload and streaming limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Slug generation settings.
    #[serde(default)]
    pub slugs: SlugConfig,

    /// Argon2 parameters for drop passphrases.
    #[serde(default)]
    pub argon2: Argon2Config,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings (metrics + health probes).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            metadata: MetadataConfig::default(),
            storage: StorageConfig::default(),
            limits: LimitsConfig::default(),
            slugs: SlugConfig::default(),
            argon2: Argon2Config::default(),
            logging: LoggingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Operator authentication settings.
///
/// Teledrop is a single-operator service: one configured identity owns
/// every drop.  Token issuance (login, JWT refresh, API keys) lives in
/// front of the core; the core only compares the presented token.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Bearer/cookie token identifying the operator.
    #[serde(default = "default_operator_token")]
    pub operator_token: String,

    /// Identity id recorded as `owner_id` on drops the operator creates.
    #[serde(default = "default_operator_id")]
    pub operator_id: String,

    /// Name of the session cookie carrying the operator token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            operator_token: default_operator_token(),
            operator_id: default_operator_id(),
            cookie_name: default_cookie_name(),
        }
    }
}

/// Metadata store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    /// SQLite-specific configuration.
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            sqlite: SqliteConfig::default(),
        }
    }
}

/// SQLite-specific metadata configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_metadata_path")]
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_metadata_path(),
        }
    }
}

/// Blob storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend type: `local` or `s3`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Local storage configuration.
    #[serde(default)]
    pub local: LocalStorageConfig,

    /// S3-compatible gateway configuration.
    #[serde(default)]
    pub s3: Option<S3StorageConfig>,

    /// Directory for staging files while the S3 sink uploads.
    #[serde(default = "default_spool_dir")]
    pub spool_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            local: LocalStorageConfig::default(),
            s3: None,
            spool_dir: default_spool_dir(),
        }
    }
}

/// Local filesystem storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    /// Root directory for stored blobs.
    #[serde(default = "default_storage_root")]
    pub root_dir: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_storage_root(),
        }
    }
}

/// S3-compatible gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct S3StorageConfig {
    /// Backing S3 bucket name.
    pub bucket: String,
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Key prefix in the backing bucket.
    #[serde(default)]
    pub prefix: String,
    /// Custom S3-compatible endpoint (e.g. MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: String,
    /// Force path-style URL addressing.
    #[serde(default)]
    pub use_path_style: bool,
    /// Explicit access key (falls back to env/credential chain).
    #[serde(default)]
    pub access_key_id: String,
    /// Explicit secret key (falls back to env/credential chain).
    #[serde(default)]
    pub secret_access_key: String,
}

/// Upload and streaming limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum upload size in bytes (0 = unlimited).
    #[serde(default)]
    pub max_upload_size: u64,

    /// Chunk size in bytes for streaming reads and writes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Deadline in seconds for a single upload operation (0 = none).
    #[serde(default)]
    pub operation_deadline: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 0,
            chunk_size: default_chunk_size(),
            operation_deadline: 0,
        }
    }
}

/// Slug generation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SlugConfig {
    /// Length of auto-generated slugs.
    #[serde(default = "default_slug_length")]
    pub length: usize,

    /// Alphabet auto-generated slugs draw from.
    #[serde(default = "default_slug_alphabet")]
    pub alphabet: String,

    /// Slugs that collide with route segments and may never be used.
    #[serde(default = "default_reserved_slugs")]
    pub reserved: Vec<String>,
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            length: default_slug_length(),
            alphabet: default_slug_alphabet(),
            reserved: default_reserved_slugs(),
        }
    }
}

/// Argon2id parameters for drop passphrase hashing.
#[derive(Debug, Clone, Deserialize)]
pub struct Argon2Config {
    /// Memory cost in KiB.
    #[serde(default = "default_argon2_memory")]
    pub memory_kib: u32,

    /// Number of iterations.
    #[serde(default = "default_argon2_iterations")]
    pub iterations: u32,

    /// Degree of parallelism.
    #[serde(default = "default_argon2_parallelism")]
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_kib: default_argon2_memory(),
            iterations: default_argon2_iterations(),
            parallelism: default_argon2_parallelism(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,

    /// Enable the `/health` probe.
    #[serde(default = "default_true")]
    pub health_check: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics: true,
            health_check: true,
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8742
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_operator_token() -> String {
    "teledrop-dev-token".to_string()
}

fn default_operator_id() -> String {
    "operator".to_string()
}

fn default_cookie_name() -> String {
    "teledrop_session".to_string()
}

fn default_metadata_path() -> String {
    "./data/teledrop.db".to_string()
}

fn default_storage_backend() -> String {
    "local".to_string()
}

fn default_storage_root() -> String {
    "./data/drops".to_string()
}

fn default_spool_dir() -> String {
    "./data/spool".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_chunk_size() -> usize {
    1024 * 1024
}

fn default_slug_length() -> usize {
    8
}

fn default_slug_alphabet() -> String {
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789".to_string()
}

fn default_reserved_slugs() -> Vec<String> {
    ["api", "docs", "health", "metrics", "keycheck"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_argon2_memory() -> u32 {
    19_456
}

fn default_argon2_iterations() -> u32 {
    2
}

fn default_argon2_parallelism() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}
