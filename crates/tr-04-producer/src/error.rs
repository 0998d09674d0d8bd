//! Producer error types.

use shared_crypto::CryptoError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProducerError {
    /// Configuration rejected by `validate()` or unparseable env var
    #[error("invalid producer configuration: {0}")]
    Config(String),

    /// Sample data file could not be read
    #[error("cannot read data file {path}: {source}")]
    DataFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Sample data file is not `{names, cities}` JSON
    #[error("invalid data file: {0}")]
    DataFormat(String),

    #[error("encryption failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("event encoding failed: {0}")]
    Encode(#[from] shared_types::WireError),

    /// Every reconnect attempt failed
    #[error("hub unreachable after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}
