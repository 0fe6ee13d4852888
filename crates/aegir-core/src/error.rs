//! Protocol error codes and rejection payloads.
//!
//! Protocol-level failures are data, not exceptions: a handler records a
//! [`ProtocolError`] on its transaction and a later response-apply handler
//! renders it. Error codes follow RFC 6749 wire names.

use serde::{Deserialize, Serialize};

/// OAuth2/OIDC error codes used by the engine, as defined in RFC 6749 and
/// RFC 7662.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is missing a required parameter or is otherwise malformed.
    InvalidRequest,
    /// Client authentication failed.
    InvalidClient,
    /// The presented token is invalid, expired, or of an unknown format.
    InvalidToken,
    /// The provided authorization grant is invalid.
    InvalidGrant,
    /// The server encountered an unexpected condition.
    ServerError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidToken => "invalid_token",
            Self::InvalidGrant => "invalid_grant",
            Self::ServerError => "server_error",
        };
        write!(f, "{}", s)
    }
}

/// Structured protocol rejection following RFC 6749 Section 5.2.
///
/// Set on a transaction via `reject`; rendered into the outbound response
/// exactly once by the generic error-rendering handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    /// Error code.
    pub error: ErrorCode,
    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// URI with more information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl ProtocolError {
    /// Create a new rejection with a description.
    pub fn new(error: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
            error_uri: None,
        }
    }

    /// Attach a reference URI.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.error_uri = Some(uri.into());
        self
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::InvalidRequest.to_string(), "invalid_request");
        assert_eq!(ErrorCode::InvalidToken.to_string(), "invalid_token");
        assert_eq!(ErrorCode::ServerError.to_string(), "server_error");
    }

    #[test]
    fn test_protocol_error_serialization() {
        let err = ProtocolError::new(ErrorCode::InvalidRequest, "missing parameter")
            .with_uri("https://example.com/errors#invalid_request");

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"error\":\"invalid_request\""));
        assert!(json.contains("\"error_description\":\"missing parameter\""));
        assert!(json.contains("\"error_uri\""));
    }

    #[test]
    fn test_protocol_error_skips_none_fields() {
        let err = ProtocolError {
            error: ErrorCode::InvalidToken,
            error_description: None,
            error_uri: None,
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("error_description"));
        assert!(!json.contains("error_uri"));
    }

    #[test]
    fn test_display_with_description() {
        let err = ProtocolError::new(ErrorCode::InvalidToken, "unknown format");
        assert_eq!(err.to_string(), "invalid_token: unknown format");
    }
}
