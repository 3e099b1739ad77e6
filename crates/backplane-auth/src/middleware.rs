//! Axum integration: a middleware that authenticates bearer tokens and
//! an extractor that hands the resulting identity to handlers.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::{AuthError, AuthResult};
use crate::service::{AuthContext, AuthService};

/// State handed to [`require_auth`] via
/// `axum::middleware::from_fn_with_state`.
#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthService>,
}

impl AuthState {
    #[must_use]
    pub fn new(service: Arc<AuthService>) -> Self {
        Self { service }
    }
}

/// Rejects requests without a valid bearer token and stashes the
/// authenticated [`AuthContext`] in the request extensions.
pub async fn require_auth(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers())?;
    let context = state.service.authenticate(token).await?;
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Pulls the bearer token out of an `Authorization` header.
///
/// # Errors
///
/// Returns `Unauthorized` when the header is absent and `InvalidToken`
/// when it is malformed or uses another scheme.
pub fn bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(AuthError::unauthorized("missing Authorization header"));
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::invalid_token("malformed Authorization header"))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::invalid_token("expected a bearer token"))
}

/// Extracts the identity placed by [`require_auth`]. Fails with 401 on
/// routes the middleware does not cover.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthContext);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AuthError::unauthorized("authentication required"))
    }
}
