use axum::{
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod common;
pub mod dashboard;
pub mod shipments;
pub mod system;
pub mod tracking;

/// Router for unauthenticated endpoints.
pub fn public_router() -> Router {
    Router::new()
        .route("/track/:tracking_number", get(tracking::track))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
}

/// Router for all authenticated endpoints.
pub fn protected_router() -> Router {
    Router::new()
        .route("/auth/me", get(auth::me).patch(auth::update_profile))
        .route("/auth/password", post(auth::change_password))
        .route(
            "/shipments",
            post(shipments::create_shipment).get(shipments::list_shipments),
        )
        .route("/shipments/:tracking_number", get(shipments::get_shipment))
        .route(
            "/shipments/:tracking_number/events",
            post(shipments::append_event),
        )
        .route(
            "/shipments/:tracking_number/delivery-attempts",
            post(shipments::record_delivery_attempt),
        )
        .route(
            "/shipments/:tracking_number/assign",
            post(shipments::assign_agent),
        )
        .route("/dashboard/stats", get(dashboard::stats))
}
