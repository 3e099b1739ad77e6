//! OAuth2 login, callback and logout endpoints.
//!
//! All three answer 503 when the instance runs without authentication,
//! keeping the route table stable across configurations.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use backplane_api::ErrorBody;
use backplane_auth::bearer_token;
use serde::Deserialize;

use crate::state::{AppState, AuthComponents};

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

fn auth_disabled() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorBody {
            error: "auth_disabled".to_string(),
            message: "authentication is not enabled on this instance".to_string(),
        }),
    )
        .into_response()
}

fn components(state: &AppState) -> Result<&AuthComponents, Response> {
    state.auth.as_ref().ok_or_else(auth_disabled)
}

/// Starts the login flow by redirecting the browser to the provider.
pub async fn login(State(state): State<AppState>) -> Response {
    let auth = match components(&state) {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    match auth.service.login_redirect() {
        Ok(url) => Redirect::temporary(url.as_str()).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Completes the login flow: exchanges the code, provisions the user
/// and redirects with the issued token attached.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let auth = match components(&state) {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    match auth.service.handle_callback(&params.code, &params.state).await {
        Ok(outcome) => {
            let target = format!("{}?token={}", auth.success_redirect, outcome.token);
            Redirect::temporary(&target).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// Revokes the session behind the presented token. Repeating a logout
/// is harmless.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let auth = match components(&state) {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(err) => return err.into_response(),
    };
    match auth.service.logout(token).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}
