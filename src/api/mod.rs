//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api`:
//! - `/auth` registration, login, logout, password reset
//! - `/users` profile and user administration
//! - `/content` content items, likes and their comments
//! - `/comments` comment management
//! - `/health` liveness probe

pub mod auth;
pub mod comments;
pub mod common;
pub mod content;
pub mod middleware;
pub mod responses;
pub mod users;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/users", users::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/users", users::protected_router())
        .nest("/content", content::protected_router())
        .nest("/comments", comments::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Visibility depends on the caller, if any
    let viewer_routes = Router::new()
        .nest("/content", content::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ));

    // Public routes
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::public_router())
        .nest("/content", content::comments_public_router())
        .nest("/comments", comments::public_router())
        .merge(viewer_routes)
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .fallback(middleware::route_not_found)
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        // Outermost: a panicking handler still yields the JSON 500 body
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
        .with_state(state)
}

/// CORS for the single SPA origin, with cookie credentials allowed
fn cors_layer(cors_origin: &str) -> CorsLayer {
    let origin = match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(e) => {
            tracing::warn!(origin = cors_origin, error = %e, "invalid CORS origin, cross-origin requests disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "success": true, "status": "ok" }))
}
