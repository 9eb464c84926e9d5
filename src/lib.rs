use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod identity;
pub mod lifecycle;
pub mod routes;
pub mod shell;

use config::Config;
use db::Database;
use error::AppError;
use identity::{IdentityProvider, SessionEvents};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn Database>,
    pub identity: Arc<dyn IdentityProvider>,
    pub events: SessionEvents,
}

/// API paths reachable without a session.
const PUBLIC_API_PATHS: [&str; 2] = ["/api/stats", "/api/shell"];

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/api/stats", get(routes::landing::stats))
        .route("/api/shell", get(routes::shell::shell))
        .route("/api/me", get(auth::me))
        .route(
            "/api/donations",
            get(routes::donations::list_donations).post(routes::donations::create_donation),
        )
        .route(
            "/api/donations/{id}",
            put(routes::donations::update_donation).delete(routes::donations::delete_donation),
        )
        .route("/api/ngo/donations", get(routes::ngo::ngo_dashboard))
        .route("/api/ngo/donations/{id}/claim", post(routes::ngo::claim_donation))
        .route("/api/admin/ngos/pending", get(routes::admin::list_pending_ngos))
        .route("/api/admin/ngos/{id}/approve", post(routes::admin::approve_ngo))
        .route("/api/admin/ngos/{id}", delete(routes::admin::reject_ngo))
        .route("/api/notifications", get(routes::notifications::list_notifications))
        .route("/api/notifications/{id}/read", post(routes::notifications::mark_read))
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), require_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_auth(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    // Only API endpoints are guarded; auth and health stay open.
    let path = req.uri().path();
    if req.method() == Method::OPTIONS
        || !path.starts_with("/api/")
        || PUBLIC_API_PATHS.contains(&path)
    {
        return next.run(req).await;
    }

    if let Some(token) = auth::extract_token_from_headers(req.headers()) {
        if auth::decode_jwt(&state.config, &token).is_ok() {
            return next.run(req).await;
        }
    }

    AppError::Unauthorized("Unauthorized".to_string()).into_response()
}

async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

async fn health_check() -> &'static str {
    "OK"
}
