//! JWT issuance and verification.
//!
//! Tokens are signed with HMAC-SHA256 using a shared secret from
//! configuration. Every token carries a `jti` claim that doubles as the
//! session key, so verification alone never grants access; the session
//! registry has the final word.

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::types::User;

/// Claims carried by a backplane access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,

    /// Subject: the user id.
    pub sub: String,

    /// Token id; also the session key.
    pub jti: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    pub username: String,

    pub email: String,

    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenClaims {
    /// Builds claims for a user, expiring `ttl` from now.
    #[must_use]
    pub fn for_user(issuer: impl Into<String>, user: &User, ttl: Duration) -> Self {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            iss: issuer.into(),
            sub: user.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl.whole_seconds(),
            username: user.username.clone(),
            email: user.email.clone(),
            roles: user.roles.clone(),
        }
    }

    /// The subject parsed back into a user id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` when the subject is not a UUID.
    pub fn user_id(&self) -> AuthResult<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AuthError::invalid_token(format!("subject is not a user id: {}", self.sub)))
    }

    /// Expiration as a timestamp type.
    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.exp)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

/// Service for signing and verifying access tokens.
///
/// Thread-safe; share it behind an `Arc`.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    token_ttl: Duration,
}

impl JwtService {
    /// Creates a service from a shared HMAC secret.
    #[must_use]
    pub fn from_secret(secret: &str, issuer: impl Into<String>, token_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            token_ttl,
        }
    }

    /// Returns the issuer claim value.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the configured token lifetime.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Issues a signed token for the user.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn issue(&self, user: &User) -> AuthResult<(String, TokenClaims)> {
        let claims = TokenClaims::for_user(&self.issuer, user, self.token_ttl);
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::internal(format!("failed to encode token: {e}")))?;
        Ok((token, claims))
    }

    /// Verifies a token's signature, issuer, and expiry.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired` for stale tokens and `InvalidToken` for
    /// everything else that fails verification.
    pub fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = true;
        validation.validate_aud = false;

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    /// Verifies signature and issuer but tolerates an expired token.
    ///
    /// Logout uses this so an expired token can still end its session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` when the signature or issuer is wrong.
    pub fn verify_allow_expired(&self, token: &str) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = false;
        validation.validate_aud = false;

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature => AuthError::invalid_token("invalid signature"),
        ErrorKind::InvalidIssuer => AuthError::invalid_token("invalid issuer"),
        _ => AuthError::invalid_token(err.to_string()),
    }
}
