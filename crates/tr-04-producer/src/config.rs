//! Producer configuration.

use crate::error::ProducerError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Default hub endpoint.
pub const DEFAULT_LISTENER_URL: &str = "ws://localhost:3001/ws?role=producer";

#[derive(Clone)]
pub struct ProducerConfig {
    /// Hub WebSocket endpoint, always carrying `role=producer`
    pub listener_url: String,
    /// Shared secret; the cipher key is its SHA-256
    pub shared_secret: String,
    /// Time between batches while emitting (default: 10s)
    pub emit_interval: Duration,
    /// Smallest batch (default: 49)
    pub min_messages: usize,
    /// Largest batch (default: 499)
    pub max_messages: usize,
    /// Optional `{names, cities}` JSON file; built-in samples otherwise
    pub data_file: Option<PathBuf>,
    /// Connection attempts after a drop before giving up (default: 5)
    pub reconnect_attempts: u32,
    /// Pause between connection attempts (default: 1s)
    pub reconnect_delay: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            listener_url: DEFAULT_LISTENER_URL.to_string(),
            shared_secret: String::new(),
            emit_interval: Duration::from_millis(10_000),
            min_messages: 49,
            max_messages: 499,
            data_file: None,
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl std::fmt::Debug for ProducerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerConfig")
            .field("listener_url", &self.listener_url)
            .field("shared_secret", &"<redacted>")
            .field("emit_interval", &self.emit_interval)
            .field("min_messages", &self.min_messages)
            .field("max_messages", &self.max_messages)
            .field("data_file", &self.data_file)
            .field("reconnect_attempts", &self.reconnect_attempts)
            .field("reconnect_delay", &self.reconnect_delay)
            .finish()
    }
}

impl ProducerConfig {
    /// Defaults overridden by `LISTENER_URL`, `ENCRYPTION_KEY`,
    /// `EMIT_INTERVAL` (ms), `MIN_MESSAGES`, `MAX_MESSAGES`, `DATA_FILE`,
    /// `RECONNECT_ATTEMPTS` and `RECONNECT_DELAY_MS`.
    pub fn from_env() -> Result<Self, ProducerError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProducerError> {
        let mut config = Self::default();

        if let Some(url) = lookup("LISTENER_URL") {
            config.listener_url = normalize_listener_url(&url)?;
        }
        if let Some(secret) = lookup("ENCRYPTION_KEY") {
            config.shared_secret = secret;
        }
        if let Some(ms) = parse_var(&lookup, "EMIT_INTERVAL")? {
            config.emit_interval = Duration::from_millis(ms);
        }
        if let Some(min) = parse_var(&lookup, "MIN_MESSAGES")? {
            config.min_messages = min;
        }
        if let Some(max) = parse_var(&lookup, "MAX_MESSAGES")? {
            config.max_messages = max;
        }
        if let Some(path) = lookup("DATA_FILE") {
            config.data_file = Some(PathBuf::from(path));
        }
        if let Some(attempts) = parse_var(&lookup, "RECONNECT_ATTEMPTS")? {
            config.reconnect_attempts = attempts;
        }
        if let Some(ms) = parse_var(&lookup, "RECONNECT_DELAY_MS")? {
            config.reconnect_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProducerError> {
        if self.shared_secret.is_empty() {
            return Err(ProducerError::Config(
                "shared secret is empty (set ENCRYPTION_KEY)".into(),
            ));
        }
        if self.min_messages == 0 {
            return Err(ProducerError::Config("MIN_MESSAGES must be at least 1".into()));
        }
        if self.min_messages > self.max_messages {
            return Err(ProducerError::Config(format!(
                "MIN_MESSAGES ({}) exceeds MAX_MESSAGES ({})",
                self.min_messages, self.max_messages
            )));
        }
        if self.emit_interval.is_zero() {
            return Err(ProducerError::Config("EMIT_INTERVAL cannot be 0".into()));
        }
        if self.reconnect_attempts == 0 {
            return Err(ProducerError::Config(
                "RECONNECT_ATTEMPTS must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<T>, ProducerError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ProducerError::Config(format!("invalid value for {var}: {raw:?}"))),
    }
}

/// Turn a hub address into its producer WebSocket endpoint.
///
/// `http`/`https` become `ws`/`wss`, a bare host gets `ws://`, an empty path
/// becomes `/ws`, any fragment is dropped and `role` is forced to `producer`.
pub fn normalize_listener_url(raw: &str) -> Result<String, ProducerError> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("ws://{raw}")
    };
    let invalid =
        |reason: String| ProducerError::Config(format!("invalid LISTENER_URL {raw:?}: {reason}"));

    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid(format!("cannot switch to {scheme}")))?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/ws");
    }
    url.set_fragment(None);

    let params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "role")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(params)
        .append_pair("role", "producer");

    Ok(url.into())
}
