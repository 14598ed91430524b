//! HTTP API application wiring (Axum router + service wiring).
//!
//! Folder layout:
//! - `services.rs`: infrastructure wiring (event store/bus, projections, dispatcher)
//! - `routes/`: HTTP routes + handlers (one file per surface area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use parceltrace_identity::TokenCodec;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(jwt_secret: String, tracking_prefix: String) -> Router {
    let services = Arc::new(
        services::build_services(&jwt_secret, &tracking_prefix)
            .expect("failed to build application services"),
    );

    let auth_state = middleware::AuthState {
        tokens: services.tokens.clone() as Arc<dyn TokenCodec>,
    };

    // Public routes: status lookup + registration/login.
    let public = routes::public_router().layer(Extension(services.clone()));

    // Protected routes: require a valid bearer token.
    let protected = routes::protected_router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(public)
        .merge(protected)
        .layer(ServiceBuilder::new())
}
