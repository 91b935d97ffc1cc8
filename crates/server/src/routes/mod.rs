use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod auth;
mod collections;
mod health;
mod profiles;
mod usage;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Identity
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        // Federated sign-in (device code flow)
        .route("/auth/device-code", post(auth::device_code))
        .route("/auth/device-poll", post(auth::device_poll))
        .route("/auth/device-complete", post(auth::device_complete))
        // Profile documents
        .route(
            "/profiles/:id",
            get(profiles::get_profile)
                .put(profiles::put_profile)
                .patch(profiles::patch_profile),
        )
        // Usage counters
        .route("/usage/:id", get(usage::get_usage))
        .route("/usage/:id/increment", post(usage::increment_usage))
        // Demo collections
        .route(
            "/collections/:name",
            get(collections::get_collection).put(collections::put_collection),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
