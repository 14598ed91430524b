use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use parceltrace_core::AccountId;
use parceltrace_infra::services::{NewShipment, ShipmentListQuery, TrackingEventInput};
use parceltrace_policy::{project_shipment, WriteOp};
use parceltrace_shipments::{AgentStamp, ShipmentStatus};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::AuthContext;

pub async fn create_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::CreateShipmentRequest>,
) -> axum::response::Response {
    let caller = common::resolve_caller(&services, &ctx);
    if let Err(resp) = common::require_write(&caller, WriteOp::CreateShipment) {
        return resp;
    }

    let input = NewShipment {
        sender: body.sender,
        recipient: body.recipient,
        package: body.package,
        service_type: body.service_type,
        priority: body.priority,
        cost: body.cost,
        insurance: body.insurance,
        payment_method: body.payment_method,
    };

    match services.shipments.create(input, ctx.account_id(), Utc::now()) {
        Ok((shipment_id, tracking_number)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": shipment_id.to_string(),
                "tracking_number": tracking_number.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_shipments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<dto::ListShipmentsQuery>,
) -> axum::response::Response {
    let caller = common::resolve_caller(&services, &ctx);

    let status = match &query.status {
        Some(raw) => match raw.parse::<ShipmentStatus>() {
            Ok(status) => Some(status),
            Err(e) => return errors::domain_error_to_response(e),
        },
        None => None,
    };

    let email = services
        .identity
        .get(ctx.account_id())
        .map(|a| a.email)
        .unwrap_or_default();

    let now = Utc::now();
    let page = services.shipments.find_by_user(
        ctx.account_id(),
        &email,
        ShipmentListQuery {
            page: query.page,
            limit: query.limit,
            status,
        },
    );

    let items: Vec<serde_json::Value> = page
        .items
        .iter()
        .map(|shipment| {
            serde_json::to_value(project_shipment(shipment, &caller, now))
                .unwrap_or(serde_json::Value::Null)
        })
        .collect();

    Json(serde_json::json!({
        "items": items,
        "page": page.page,
        "limit": page.limit,
        "total": page.total,
    }))
    .into_response()
}

pub async fn get_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(tracking_number): Path<String>,
) -> axum::response::Response {
    let caller = common::resolve_caller(&services, &ctx);

    match services.shipments.find_by_tracking_number(&tracking_number) {
        Ok(Some(shipment)) => {
            Json(project_shipment(&shipment, &caller, Utc::now())).into_response()
        }
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "shipment not found"),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn append_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(tracking_number): Path<String>,
    Json(body): Json<dto::TrackingEventRequest>,
) -> axum::response::Response {
    let caller = common::resolve_caller(&services, &ctx);
    if let Err(resp) = common::require_write(&caller, WriteOp::AppendTrackingEvent) {
        return resp;
    }

    let status = match body.status.parse::<ShipmentStatus>() {
        Ok(status) => status,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let input = TrackingEventInput {
        status,
        location: body.location,
        description: body.description,
        occurred_at: body.timestamp,
        coordinates: body.coordinates,
        agent: agent_stamp(&services, ctx.account_id()),
    };

    match services
        .shipments
        .record_tracking_event(&tracking_number, input, Utc::now())
    {
        Ok(committed) => Json(serde_json::json!({
            "tracking_number": tracking_number,
            "events_committed": committed,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn record_delivery_attempt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(tracking_number): Path<String>,
    Json(body): Json<dto::DeliveryAttemptRequest>,
) -> axum::response::Response {
    let caller = common::resolve_caller(&services, &ctx);
    if let Err(resp) = common::require_write(&caller, WriteOp::RecordDeliveryAttempt) {
        return resp;
    }

    match services.shipments.record_delivery_attempt(
        &tracking_number,
        body.location,
        agent_stamp(&services, ctx.account_id()),
        Utc::now(),
    ) {
        Ok(committed) => Json(serde_json::json!({
            "tracking_number": tracking_number,
            "events_committed": committed,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn assign_agent(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(tracking_number): Path<String>,
    Json(body): Json<dto::AssignAgentRequest>,
) -> axum::response::Response {
    let caller = common::resolve_caller(&services, &ctx);
    if let Err(resp) = common::require_write(&caller, WriteOp::AssignAgent) {
        return resp;
    }

    let agent_id: AccountId = match body.agent_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid agent id");
        }
    };

    match services
        .shipments
        .assign_agent(&tracking_number, agent_id, Utc::now())
    {
        Ok(committed) => Json(serde_json::json!({
            "tracking_number": tracking_number,
            "events_committed": committed,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Stamp lifecycle mutations with the acting agent's identity.
fn agent_stamp(services: &AppServices, account_id: AccountId) -> Option<AgentStamp> {
    services.identity.get(account_id).map(|account| AgentStamp {
        agent_id: account.id,
        name: account.name,
        contact: account.email,
    })
}
