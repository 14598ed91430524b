use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

use parceltrace_identity::{Role, TokenCodec};
use parceltrace_infra::services::NewAccount;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::AuthContext;

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    let input = NewAccount {
        name: body.name,
        email: body.email,
        phone: body.phone,
        password: body.password,
        role: body.role.unwrap_or(Role::User),
    };

    let account_id = match services.identity.register(input, Utc::now()) {
        Ok(id) => id,
        Err(e) => return errors::service_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": account_id.to_string() })),
    )
        .into_response()
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let now = Utc::now();
    let account = match services.identity.authenticate(&body.email, &body.password, now) {
        Ok(account) => account,
        Err(e) => return errors::service_error_to_response(e),
    };

    let token = match services.tokens.issue(account.id, account.role, now) {
        Ok(token) => token,
        Err(e) => {
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "token_error",
                e.to_string(),
            );
        }
    };

    Json(serde_json::json!({
        "token": token,
        "account": dto::account_to_json(&account),
    }))
    .into_response()
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    match services.identity.get(ctx.account_id()) {
        Some(account) => Json(dto::account_to_json(&account)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "account not found"),
    }
}

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::UpdateProfileRequest>,
) -> axum::response::Response {
    match services
        .identity
        .update_profile(ctx.account_id(), body.name, body.phone, Utc::now())
    {
        Ok(()) => Json(serde_json::json!({ "updated": true })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::ChangePasswordRequest>,
) -> axum::response::Response {
    match services.identity.change_password(
        ctx.account_id(),
        &body.current_password,
        &body.new_password,
        Utc::now(),
    ) {
        Ok(()) => Json(serde_json::json!({ "changed": true })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
