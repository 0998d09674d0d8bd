//! Hub error types.

use crate::domain::config::ConfigError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::net::SocketAddr;
use tr_01_aggregation_store::StoreError;

/// Hub service errors
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Configuration rejected by `validate()`
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Listener could not bind
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// HTTP server stopped with an error
    #[error("server error: {0}")]
    Server(#[source] std::io::Error),

    /// Store backend could not be opened or queried
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Control dispatcher is no longer running
    #[error("control dispatcher stopped")]
    ControlClosed,
}

impl HubError {
    fn status(&self) -> StatusCode {
        match self {
            HubError::ControlClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            HubError::ControlClosed.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            HubError::Store(StoreError::io("disk gone"))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: HubError = ConfigError::MissingSecret.into();
        assert!(err.to_string().contains("ENCRYPTION_KEY"));
    }
}
