//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    applications_handler, cache_stats_handler, delete_license_handler, delete_user_handler,
    generate_licenses_handler, health_handler, license_stats_handler, list_licenses_handler,
    list_users_handler, redeem_license_handler, update_user_status_handler, usage_handler,
    user_records_handler, user_stats_handler, verify_license_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin (the console is served from another host)
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/cache/stats", get(cache_stats_handler))
        .route("/applications", get(applications_handler))
        .route("/usage", get(usage_handler))
        .route("/users", get(list_users_handler))
        .route("/users/stats", get(user_stats_handler))
        .route("/users/:id", delete(delete_user_handler))
        .route("/users/:id/status", patch(update_user_status_handler))
        .route("/apps/:app/users/:id/:kind", get(user_records_handler))
        .route(
            "/licenses",
            get(list_licenses_handler).post(generate_licenses_handler),
        )
        .route("/licenses/stats", get(license_stats_handler))
        .route("/licenses/verify", post(verify_license_handler))
        .route("/licenses/redeem", post(redeem_license_handler))
        .route("/licenses/:id", delete(delete_license_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
