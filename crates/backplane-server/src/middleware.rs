//! HTTP middleware owned by the server crate.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

static REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Tags every request with an `X-Request-Id` and echoes it on the response.
///
/// A caller-supplied id wins; otherwise a fresh UUID is minted. The value is
/// also stored in request extensions so log spans can pick it up.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let id = match req.headers().get(&REQUEST_ID) {
        Some(value) => value.clone(),
        None => {
            let generated = Uuid::new_v4().to_string();
            HeaderValue::from_str(&generated).unwrap_or_else(|_| HeaderValue::from_static("-"))
        }
    };

    req.extensions_mut().insert(id.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(REQUEST_ID.clone(), id);
    res
}
