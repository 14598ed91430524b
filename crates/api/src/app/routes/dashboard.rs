use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};
use chrono::Utc;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::context::AuthContext;

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    let caller = common::resolve_caller(&services, &ctx);
    if let Err(resp) = common::require_dashboard(&caller) {
        return resp;
    }

    Json(services.shipments.dashboard(Utc::now())).into_response()
}
