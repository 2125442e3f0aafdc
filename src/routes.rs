// src/routes.rs

use axum::{Router, http::Method, routing::post};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers::generate, state::AppState};

/// Assembles the application router.
///
/// * Mounts the generate endpoint; any other method on the route falls back
///   to a JSON 405 instead of axum's bare response.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (config + upstream client).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route(
            "/api/generate",
            post(generate::generate).fallback(generate::method_not_allowed),
        )
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
