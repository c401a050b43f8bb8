//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cleanup_handler, clear_handler, delete_handler, get_handler, health_handler,
    invalidate_handler, keys_handler, list_caches_handler, set_handler, stats_handler,
    touch_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin (the admin dashboard is served separately)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/caches", get(list_caches_handler))
        .route("/caches/:name/stats", get(stats_handler))
        .route("/caches/:name/keys", get(keys_handler))
        .route("/caches/:name/entries", put(set_handler))
        .route(
            "/caches/:name/entries/:key",
            get(get_handler).delete(delete_handler),
        )
        .route("/caches/:name/entries/:key/touch", post(touch_handler))
        .route("/caches/:name/clear", post(clear_handler))
        .route("/caches/:name/cleanup", post(cleanup_handler))
        .route("/caches/:name/invalidate", post(invalidate_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
