//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::auth_middleware;
use crate::handlers::{auth, health};
use crate::middleware::{no_store_middleware, security_headers_middleware};
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Authentication routes under `/authentication`
pub fn auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/sign-up", post(auth::sign_up_handler))
        .route("/sign-in", post(auth::sign_in_handler))
        .route("/refresh-tokens", post(auth::refresh_tokens_handler));

    // Protected routes (valid access token required)
    let protected_routes = Router::new()
        .route("/sign-out", post(auth::sign_out_handler))
        .route("/me", get(auth::me_handler).post(auth::me_handler))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(no_store_middleware))
}

/// CORS for the configured origins; cookies require explicit origins
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| match HeaderValue::from_str(s) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %s, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = create_cors_layer(&state.config.server.cors_origins);
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/authentication", auth_routes(state.clone()))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
