//! Role handshake.
//!
//! The role comes from the `role` query parameter of the upgrade request, or
//! failing that from the `X-Relay-Role` header. Anything else is rejected
//! before the upgrade.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use shared_types::ConnectionRole;

/// Header carrying the role when the query parameter is absent.
pub const ROLE_HEADER: &str = "x-relay-role";

/// Query string of the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    #[error("missing connection role (use ?role=producer|observer or the X-Relay-Role header)")]
    Missing,
    #[error("unknown connection role: {0}")]
    Unknown(String),
}

impl IntoResponse for HandshakeError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Resolve the role, query parameter first.
pub fn resolve_role(
    query: Option<&str>,
    header: Option<&str>,
) -> Result<ConnectionRole, HandshakeError> {
    let raw = query
        .filter(|q| !q.trim().is_empty())
        .or(header.filter(|h| !h.trim().is_empty()))
        .ok_or(HandshakeError::Missing)?;

    raw.parse()
        .map_err(|_| HandshakeError::Unknown(raw.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param() {
        assert_eq!(
            resolve_role(Some("producer"), None),
            Ok(ConnectionRole::Producer)
        );
        assert_eq!(
            resolve_role(Some("OBSERVER"), None),
            Ok(ConnectionRole::Observer)
        );
    }

    #[test]
    fn test_header_fallback() {
        assert_eq!(
            resolve_role(None, Some("observer")),
            Ok(ConnectionRole::Observer)
        );
        assert_eq!(
            resolve_role(Some(""), Some("producer")),
            Ok(ConnectionRole::Producer)
        );
    }

    #[test]
    fn test_query_wins_over_header() {
        assert_eq!(
            resolve_role(Some("observer"), Some("producer")),
            Ok(ConnectionRole::Observer)
        );
    }

    #[test]
    fn test_missing_and_unknown() {
        assert_eq!(resolve_role(None, None), Err(HandshakeError::Missing));
        assert_eq!(resolve_role(Some(" "), None), Err(HandshakeError::Missing));
        assert_eq!(
            resolve_role(Some("admin"), None),
            Err(HandshakeError::Unknown("admin".into()))
        );
    }

    #[test]
    fn test_rejection_is_bad_request() {
        assert_eq!(
            HandshakeError::Missing.into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
