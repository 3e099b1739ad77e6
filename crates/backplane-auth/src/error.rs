//! Authentication and session error types.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Result alias for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur during authentication and session handling.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The access token is invalid, malformed, or cannot be verified.
    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    /// The request lacks valid authentication credentials.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The authenticated user does not have permission for the action.
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// The access token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The token's session has been evicted or ended by logout.
    #[error("Session revoked")]
    SessionRevoked,

    /// The session outlived its configured lifetime.
    #[error("Session expired")]
    SessionExpired,

    /// The OAuth callback carried an unknown or stale state value.
    #[error("Invalid login state: {message}")]
    InvalidState { message: String },

    /// The identity provider rejected the authorization grant.
    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    /// The identity provider could not be reached or returned garbage.
    #[error("Identity provider error: {provider} - {message}")]
    IdentityProvider { provider: String, message: String },

    /// An error occurred while storing or retrieving auth data.
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidState` error.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `IdentityProvider` error.
    #[must_use]
    pub fn identity_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IdentityProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken { .. }
                | Self::Unauthorized { .. }
                | Self::Forbidden { .. }
                | Self::TokenExpired
                | Self::SessionRevoked
                | Self::SessionExpired
                | Self::InvalidState { .. }
                | Self::InvalidGrant { .. }
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Short machine-readable code for the response body.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidToken { .. } => "invalid_token",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::TokenExpired => "token_expired",
            Self::SessionRevoked => "session_revoked",
            Self::SessionExpired => "session_expired",
            Self::InvalidState { .. } => "invalid_state",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::IdentityProvider { .. } => "identity_provider_error",
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "server_error"
            }
        }
    }

    /// HTTP status for the error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidToken { .. }
            | Self::Unauthorized { .. }
            | Self::TokenExpired
            | Self::SessionRevoked
            | Self::SessionExpired => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::InvalidState { .. } | Self::InvalidGrant { .. } => StatusCode::BAD_REQUEST,
            Self::IdentityProvider { .. } => StatusCode::BAD_GATEWAY,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Server-side detail stays in the log, not the response.
        let message = if self.is_server_error() {
            tracing::error!(error = %self, "auth error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = format!(
                "Bearer realm=\"backplane\", error=\"{}\", error_description=\"{}\"",
                self.code(),
                message.replace('"', "\\\"")
            );
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        let body = json!({
            "error": self.code(),
            "message": message,
        });
        (status, headers, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::invalid_token("bad signature");
        assert_eq!(err.to_string(), "Invalid token: bad signature");

        let err = AuthError::TokenExpired;
        assert_eq!(err.to_string(), "Token expired");

        let err = AuthError::identity_provider("google", "connection refused");
        assert_eq!(
            err.to_string(),
            "Identity provider error: google - connection refused"
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(AuthError::unauthorized("no header").is_client_error());
        assert!(AuthError::TokenExpired.is_client_error());
        assert!(AuthError::SessionRevoked.is_client_error());
        assert!(!AuthError::storage("down").is_client_error());
        assert!(AuthError::storage("down").is_server_error());
        assert!(AuthError::identity_provider("google", "timeout").is_server_error());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::forbidden("x").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::invalid_grant("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::identity_provider("g", "x").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AuthError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_unauthorized_response_carries_www_authenticate() {
        let response = AuthError::TokenExpired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("realm=\"backplane\""));
        assert!(www_auth.contains("error=\"token_expired\""));
    }

    #[tokio::test]
    async fn test_server_error_body_is_sanitized() {
        let response = AuthError::storage("connection pool exhausted").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "server_error");
        assert_eq!(json["message"], "Internal server error");
    }
}
