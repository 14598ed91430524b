use axum::http::StatusCode;

use parceltrace_policy::{can_view_dashboard, can_write, Caller, WriteOp};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::AuthContext;

/// Resolve the token identity to a full caller (registered email included).
///
/// The account read model may briefly lag a fresh registration; the token
/// claims are still authoritative for id and role.
pub fn resolve_caller(services: &AppServices, ctx: &AuthContext) -> Caller {
    match services.identity.get(ctx.account_id()) {
        Some(account) => Caller::account(account.id, account.role, account.email),
        None => Caller::account(ctx.account_id(), ctx.role(), String::new()),
    }
}

pub fn require_write(caller: &Caller, op: WriteOp) -> Result<(), axum::response::Response> {
    if can_write(caller, op) {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "caller role does not permit this operation",
        ))
    }
}

pub fn require_dashboard(caller: &Caller) -> Result<(), axum::response::Response> {
    if can_view_dashboard(caller) {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "dashboard requires an agent or admin role",
        ))
    }
}
