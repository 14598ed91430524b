use chrono::{DateTime, Utc};
use serde::Deserialize;

use parceltrace_identity::{Account, Role};
use parceltrace_shipments::{
    GeoPoint, InsuranceTerms, PackageInfo, Party, PaymentMethod, Priority, ServiceType,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateShipmentRequest {
    pub sender: Party,
    pub recipient: Party,
    pub package: PackageInfo,
    pub service_type: ServiceType,
    #[serde(default)]
    pub priority: Priority,
    pub cost: u64,
    #[serde(default)]
    pub insurance: InsuranceTerms,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct TrackingEventRequest {
    pub status: String,
    pub location: String,
    pub description: String,
    /// Defaults to the submission time when absent.
    pub timestamp: Option<DateTime<Utc>>,
    pub coordinates: Option<GeoPoint>,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryAttemptRequest {
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignAgentRequest {
    pub agent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListShipmentsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn account_to_json(account: &Account) -> serde_json::Value {
    serde_json::json!({
        "id": account.id.to_string(),
        "name": account.name,
        "email": account.email,
        "phone": account.phone,
        "role": account.role.as_str(),
        "active": account.active,
        "last_login_at": account.last_login_at.map(|t| t.to_rfc3339()),
    })
}
