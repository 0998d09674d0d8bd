//! Hub configuration with validation.
//!
//! Defaults match a local single-node deployment; `from_env` applies the
//! `LISTENER_*`, `STORE_*` and related overrides on top.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tr_01_aggregation_store::{BucketPolicy, DEFAULT_BUCKET_CAPACITY, DEFAULT_RETENTION};

/// Main hub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Listener address
    pub server: ServerConfig,
    /// Shared secret for envelope decryption
    pub crypto: CryptoConfig,
    /// Bucket store backend and limits
    pub store: StoreConfig,
    /// Observer broadcast throttling
    pub fanout: FanoutConfig,
    /// Ingest queue and frame limits
    pub ingest: IngestConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

impl HubConfig {
    /// Load defaults overridden by process environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `LISTENER_HOST` | `server.host` |
    /// | `LISTENER_PORT` | `server.port` |
    /// | `ENCRYPTION_KEY` | `crypto.shared_secret` |
    /// | `STORE_BACKEND` | `store.backend` (`memory` / `rocksdb`) |
    /// | `STORE_PATH` | `store.data_dir` |
    /// | `BUCKET_CAPACITY` | `store.bucket_capacity` |
    /// | `RETENTION_DAYS` | `store.retention` |
    /// | `FANOUT_INTERVAL_MS` | `fanout.interval` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`HubConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = parse_var(&lookup, "LISTENER_HOST")? {
            config.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "LISTENER_PORT")? {
            config.server.port = port;
        }
        if let Some(secret) = lookup("ENCRYPTION_KEY") {
            config.crypto.shared_secret = secret;
        }
        if let Some(backend) = parse_var(&lookup, "STORE_BACKEND")? {
            config.store.backend = backend;
        }
        if let Some(path) = lookup("STORE_PATH") {
            config.store.data_dir = PathBuf::from(path);
        }
        if let Some(capacity) = parse_var(&lookup, "BUCKET_CAPACITY")? {
            config.store.bucket_capacity = capacity;
        }
        if let Some(days) = parse_var::<u64>(&lookup, "RETENTION_DAYS")? {
            config.store.retention = Duration::from_secs(days * 24 * 60 * 60);
        }
        if let Some(ms) = parse_var(&lookup, "FANOUT_INTERVAL_MS")? {
            config.fanout.interval = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crypto.shared_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        if self.store.bucket_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "bucket_capacity cannot be 0".into(),
            ));
        }
        if self.store.retention.is_zero() {
            return Err(ConfigError::InvalidInterval("retention cannot be 0".into()));
        }
        if self.store.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "sweep_interval cannot be 0".into(),
            ));
        }

        if self.fanout.interval.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "fanout interval cannot be 0".into(),
            ));
        }
        if self.fanout.channel_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "fanout channel_capacity cannot be 0".into(),
            ));
        }

        if self.ingest.queue_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "ingest queue_capacity cannot be 0".into(),
            ));
        }
        if self.ingest.max_message_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_message_size cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Listener socket address
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    /// Capacity and retention handed to the store backend
    pub fn bucket_policy(&self) -> BucketPolicy {
        BucketPolicy {
            capacity: self.store.bucket_capacity,
            retention: self.store.retention,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value: raw }),
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 3001)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3001,
        }
    }
}

/// Crypto configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Shared secret; the cipher key is its SHA-256
    pub shared_secret: String,
}

impl std::fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("shared_secret", &"<redacted>")
            .finish()
    }
}

/// Store backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    RocksDb,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "rocksdb" => Ok(StoreBackend::RocksDb),
            other => Err(ConfigError::Invalid(format!(
                "unknown store backend: {other}"
            ))),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend (default: memory)
    pub backend: StoreBackend,
    /// RocksDB directory
    pub data_dir: PathBuf,
    /// Max records per minute bucket
    pub bucket_capacity: usize,
    /// Buckets older than this are purged
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
    /// Time between retention sweeps
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Extra attempts for a failed bucket write
    pub write_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            data_dir: PathBuf::from("./data/buckets"),
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
            retention: DEFAULT_RETENTION,
            sweep_interval: Duration::from_secs(60 * 60),
            write_retries: 1,
        }
    }
}

/// Fan-out configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Minimum spacing between observer broadcasts
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Broadcast buffer per observer before it starts lagging
    pub channel_capacity: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            channel_capacity: 256,
        }
    }
}

/// Ingest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Batches waiting for the ingest dispatcher
    pub queue_capacity: usize,
    /// Larger inbound frames are dropped
    pub max_message_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            max_message_size: 4 * 1024 * 1024,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    /// Allowed methods
    pub allowed_methods: Vec<String>,
    /// Allowed request headers ("*" for all)
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache (seconds)
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            allowed_headers: vec!["*".to_string()],
            max_age: 86400,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No shared secret configured
    #[error("shared secret is empty (set ENCRYPTION_KEY)")]
    MissingSecret,
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid interval or window
    #[error("invalid interval: {0}")]
    InvalidInterval(String),
    /// Environment variable could not be parsed
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Human-readable durations: `"250ms"`, `"30s"`, `"5m"`, `"1h"`, `"30d"`.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    const UNITS: [(&str, u64); 4] = [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)];

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn format_duration(duration: Duration) -> String {
        if duration.subsec_nanos() != 0 || duration.is_zero() {
            return format!("{}ms", duration.as_millis());
        }
        let secs = duration.as_secs();
        UNITS
            .iter()
            .find(|(_, unit)| secs % unit == 0)
            .map(|(suffix, unit)| format!("{}{}", secs / unit, suffix))
            .unwrap_or_else(|| format!("{secs}s"))
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            return ms
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds");
        }
        for (suffix, unit) in UNITS {
            if let Some(value) = s.strip_suffix(suffix) {
                return value
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .and_then(|v| v.checked_mul(unit))
                    .map(Duration::from_secs)
                    .ok_or("invalid duration value");
            }
        }
        // Plain seconds
        s.parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| "invalid duration format")
    }
}
