//! Endpoints about the authenticated principal.

use axum::Json;
use backplane_api::UserProfile;
use backplane_auth::{AuthError, CurrentUser};
use serde_json::{Value, json};

pub async fn me(CurrentUser(context): CurrentUser) -> Json<UserProfile> {
    Json(UserProfile::from(context.user))
}

/// Answers only for administrators; everyone else gets a 403.
pub async fn admin_probe(CurrentUser(context): CurrentUser) -> Result<Json<Value>, AuthError> {
    if !context.is_admin() {
        return Err(AuthError::forbidden("admin role required"));
    }
    Ok(Json(json!({
        "status": "ok",
        "user": context.user.username,
    })))
}
