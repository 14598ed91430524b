use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use parceltrace_policy::{project_shipment, Caller};

use crate::app::errors;
use crate::app::services::AppServices;

/// Public status lookup: always the anonymous (redacted) projection, even if
/// the caller happens to hold a token.
pub async fn track(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tracking_number): Path<String>,
) -> axum::response::Response {
    match services.shipments.find_by_tracking_number(&tracking_number) {
        Ok(Some(shipment)) => {
            let view = project_shipment(&shipment, &Caller::Anonymous, Utc::now());
            Json(view).into_response()
        }
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "shipment not found"),
        Err(e) => errors::service_error_to_response(e),
    }
}
