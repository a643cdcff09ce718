//! Router assembly: REST endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - REST API under `/api/v1/...`
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Users
        .route("/api/v1/users", post(http::http_register).get(http::http_list_users))
        .route("/api/v1/users/:id/role", patch(http::http_change_role))
        .route("/api/v1/users/:id", delete(http::http_delete_user))
        // Courses
        .route("/api/v1/courses", get(http::http_list_courses).post(http::http_create_course))
        .route("/api/v1/courses/:id", get(http::http_get_course).patch(http::http_update_course))
        .route("/api/v1/courses/:id/publish", post(http::http_publish_course))
        .route("/api/v1/courses/:id/enroll", post(http::http_enroll))
        // Sections & content
        .route(
            "/api/v1/courses/:id/sections",
            post(http::http_add_section).put(http::http_update_sections),
        )
        .route(
            "/api/v1/courses/:id/sections/:sid",
            patch(http::http_update_section).delete(http::http_delete_section),
        )
        .route("/api/v1/courses/:id/sections/:sid/content", post(http::http_add_content))
        .route(
            "/api/v1/courses/:id/sections/:sid/content/:cid",
            patch(http::http_update_content).delete(http::http_delete_content),
        )
        // Progress & analytics
        .route(
            "/api/v1/courses/:id/sections/:sid/content/:cid/progress",
            post(http::http_submit_progress),
        )
        .route(
            "/api/v1/courses/:id/progress/:cid",
            post(http::http_submit_progress_legacy),
        )
        .route("/api/v1/courses/:id/progress", get(http::http_get_progress))
        .route("/api/v1/courses/:id/analytics", get(http::http_get_analytics))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
