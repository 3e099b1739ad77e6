//! Router assembly and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Router, middleware};
use backplane_auth::{AuthService, AuthState, require_auth};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::middleware as app_middleware;
use crate::state::AppState;

/// Builds the full application router.
///
/// Data and identity routes sit behind the bearer-token middleware when
/// auth is enabled; health and login endpoints are always open.
pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    let mut protected = Router::new()
        // Module CRUD and search
        .route(
            "/api/v1/administration-modules",
            get(handlers::modules::list_modules).post(handlers::modules::create_module),
        )
        .route(
            "/api/v1/administration-modules/search",
            get(handlers::modules::search_modules),
        )
        .route(
            "/api/v1/administration-modules/{id}",
            get(handlers::modules::get_module)
                .put(handlers::modules::update_module)
                .patch(handlers::modules::patch_module)
                .delete(handlers::modules::delete_module),
        )
        // Calculator
        .route("/api/v1/calculator/add", post(handlers::calculator::add))
        .route(
            "/api/v1/calculator/subtract",
            post(handlers::calculator::subtract),
        )
        .route(
            "/api/v1/calculator/multiply",
            post(handlers::calculator::multiply),
        )
        .route(
            "/api/v1/calculator/divide",
            post(handlers::calculator::divide),
        )
        .route(
            "/api/v1/calculator/history",
            get(handlers::calculator::history),
        )
        // Identity
        .route("/api/user/me", get(handlers::users::me))
        .route("/api/user/admin", get(handlers::users::admin_probe));

    if let Some(auth) = &state.auth {
        let auth_state = AuthState::new(Arc::clone(&auth.service));
        protected = protected.route_layer(middleware::from_fn_with_state(auth_state, require_auth));
    }

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::health::root))
        .route("/healthz", get(handlers::health::healthz))
        .route("/readyz", get(handlers::health::readyz))
        // Login flow stays reachable without a token
        .route("/api/auth/login", get(handlers::auth::login))
        .route("/api/auth/callback", get(handlers::auth::callback))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .merge(protected)
        // Middleware stack, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(body_limit))
                .layer(middleware::from_fn(app_middleware::request_id))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            let req_id = req
                                .extensions()
                                .get::<axum::http::HeaderValue>()
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("")
                                .to_string();
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri(),
                                http.status_code = tracing::field::Empty,
                                request_id = %req_id
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub struct BackplaneServer {
    addr: SocketAddr,
    app: Router,
    session_sweeper: Option<SweeperHandle>,
}

struct SweeperHandle {
    service: Arc<AuthService>,
    interval: std::time::Duration,
}

impl BackplaneServer {
    /// Assembles state and router from the configuration.
    pub async fn from_config(config: crate::config::AppConfig) -> anyhow::Result<Self> {
        let addr = config.addr();
        let state = AppState::from_config(config).await?;
        let session_sweeper = state.auth.as_ref().map(|auth| SweeperHandle {
            service: Arc::clone(&auth.service),
            interval: state.config.auth.session.cleanup_interval(),
        });
        let app = build_app(state);
        Ok(Self {
            addr,
            app,
            session_sweeper,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Binds and serves until a shutdown signal arrives. The session
    /// sweeper runs alongside the server and stops with it.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "server listening");

        let sweeper = self
            .session_sweeper
            .map(|handle| spawn_session_sweeper(handle.service, handle.interval));

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(task) = sweeper {
            task.abort();
        }
        Ok(())
    }
}

/// Periodically removes expired sessions and stale login states.
fn spawn_session_sweeper(
    service: Arc<AuthService>,
    every: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match service.sweep_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "expired sessions swept"),
                Err(err) => tracing::warn!(error = %err, "session sweep failed"),
            }
        }
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
