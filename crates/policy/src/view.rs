//! Tiered shipment projections.
//!
//! What a caller sees is a pure function of the shipment, the caller and the
//! current time. Derived fields (delay flag, delivery window, volume) are
//! computed here, never stored.

use chrono::{DateTime, Utc};
use serde::Serialize;

use parceltrace_shipments::{
    DeliveryWindow, PackageInfo, Party, PaymentInfo, ServiceInfo, ServiceType, Shipment,
    ShipmentStatus, TrackingEvent,
};

use crate::{can_read_full, Caller};

/// Redacted tracking event for anonymous lookups: no agent identity, no
/// coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicTrackingEvent {
    pub status: ShipmentStatus,
    pub location: String,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

impl From<&TrackingEvent> for PublicTrackingEvent {
    fn from(event: &TrackingEvent) -> Self {
        Self {
            status: event.status,
            location: event.location.clone(),
            description: event.description.clone(),
            occurred_at: event.occurred_at,
        }
    }
}

/// Status-only projection, safe for unauthenticated callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicShipmentView {
    pub tracking_number: String,
    pub status: ShipmentStatus,
    pub progress: u8,
    pub events: Vec<PublicTrackingEvent>,
    pub estimated_delivery: DateTime<Utc>,
    pub is_delayed: bool,
    pub service_type: ServiceType,
}

/// Full projection for associated owners and operations staff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullShipmentView {
    pub tracking_number: String,
    pub status: ShipmentStatus,
    pub progress: u8,
    pub events: Vec<TrackingEvent>,
    pub sender: Party,
    pub recipient: Party,
    pub package: PackageInfo,
    pub package_volume_m3: f64,
    pub service: ServiceInfo,
    pub payment: PaymentInfo,
    pub delivery_attempts: u8,
    pub estimated_delivery: DateTime<Utc>,
    pub is_delayed: bool,
    pub delivery_window: DeliveryWindow,
    pub assigned_agent: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

/// Projection of a shipment for a given caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ShipmentView {
    Public(PublicShipmentView),
    Full(FullShipmentView),
}

/// Project `shipment` at the visibility tier `caller` is entitled to.
pub fn project_shipment(shipment: &Shipment, caller: &Caller, now: DateTime<Utc>) -> ShipmentView {
    if can_read_full(caller, shipment) {
        ShipmentView::Full(full_view(shipment, now))
    } else {
        ShipmentView::Public(public_view(shipment, now))
    }
}

fn tracking_number(shipment: &Shipment) -> String {
    shipment
        .tracking_number()
        .map(|t| t.to_string())
        .unwrap_or_default()
}

fn public_view(shipment: &Shipment, now: DateTime<Utc>) -> PublicShipmentView {
    PublicShipmentView {
        tracking_number: tracking_number(shipment),
        status: shipment.status(),
        progress: shipment.progress(),
        events: shipment.events().iter().map(PublicTrackingEvent::from).collect(),
        estimated_delivery: shipment.service().estimated_delivery,
        is_delayed: shipment.is_delayed(now),
        service_type: shipment.service().service_type,
    }
}

fn full_view(shipment: &Shipment, now: DateTime<Utc>) -> FullShipmentView {
    FullShipmentView {
        tracking_number: tracking_number(shipment),
        status: shipment.status(),
        progress: shipment.progress(),
        events: shipment.events().to_vec(),
        sender: shipment.sender().clone(),
        recipient: shipment.recipient().clone(),
        package: shipment.package().clone(),
        package_volume_m3: shipment.package().volume_m3(),
        service: shipment.service().clone(),
        payment: shipment.payment(),
        delivery_attempts: shipment.delivery_attempts(),
        estimated_delivery: shipment.service().estimated_delivery,
        is_delayed: shipment.is_delayed(now),
        delivery_window: shipment.delivery_window(),
        assigned_agent: shipment.assigned_agent().map(|a| a.to_string()),
        delivered_at: shipment.delivered_at(),
        returned_at: shipment.returned_at(),
        cancelled_at: shipment.cancelled_at(),
        cancellation_reason: shipment.cancellation_reason().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use parceltrace_core::{AccountId, Aggregate, ShipmentId};
    use parceltrace_identity::Role;
    use parceltrace_shipments::{
        Address, AgentStamp, CreateShipment, Dimensions, InsuranceTerms, PaymentInfo, Priority,
        RecordTrackingEvent, ShipmentCommand, TrackingNumber,
    };

    fn party(name: &str, email: &str, city: &str, state: &str) -> Party {
        Party {
            name: name.to_string(),
            email: email.to_string(),
            phone: "+91-9000000000".to_string(),
            address: Address {
                street: "1 Test Lane".to_string(),
                city: city.to_string(),
                state: state.to_string(),
                postal_code: "110001".to_string(),
                country: "IN".to_string(),
            },
        }
    }

    fn shipment_with_agent_event(created_by: AccountId) -> Shipment {
        let id = ShipmentId::new();
        let mut shipment = Shipment::empty(id);
        let booked_at = Utc::now();

        let cmd = ShipmentCommand::Create(CreateShipment {
            shipment_id: id,
            tracking_number: TrackingNumber::parse("IND987654321").unwrap(),
            sender: party("Asha Verma", "asha@example.com", "Mumbai", "MH"),
            recipient: party("Ravi Iyer", "ravi@example.com", "Bengaluru", "KA"),
            package: PackageInfo {
                weight_kg: 1.0,
                dimensions: Dimensions {
                    length_cm: 10.0,
                    width_cm: 10.0,
                    height_cm: 10.0,
                },
                ..Default::default()
            },
            service: ServiceInfo::quoted(
                ServiceType::Express,
                Priority::Normal,
                20_000,
                InsuranceTerms::default(),
                booked_at,
            ),
            payment: PaymentInfo::default(),
            created_by,
            occurred_at: booked_at,
        });
        for event in shipment.handle(&cmd).unwrap() {
            shipment.apply(&event);
        }

        let cmd = ShipmentCommand::RecordTrackingEvent(RecordTrackingEvent {
            shipment_id: id,
            event: TrackingEvent {
                status: ShipmentStatus::InTransit,
                location: "Pune, MH".to_string(),
                description: "departed sorting facility".to_string(),
                occurred_at: booked_at + Duration::hours(6),
                coordinates: Some(parceltrace_shipments::GeoPoint {
                    latitude: 18.52,
                    longitude: 73.85,
                }),
                agent: Some(AgentStamp {
                    agent_id: AccountId::new(),
                    name: "Agent Kumar".to_string(),
                    contact: "kumar@courier.example".to_string(),
                }),
            },
        });
        for event in shipment.handle(&cmd).unwrap() {
            shipment.apply(&event);
        }

        shipment
    }

    #[test]
    fn anonymous_view_is_redacted() {
        let shipment = shipment_with_agent_event(AccountId::new());
        let view = project_shipment(&shipment, &Caller::Anonymous, Utc::now());

        let ShipmentView::Public(view) = view else {
            panic!("anonymous caller must get the public projection");
        };

        assert_eq!(view.tracking_number, "IND987654321");
        assert_eq!(view.status, ShipmentStatus::InTransit);
        assert_eq!(view.progress, 50);
        assert_eq!(view.events.len(), 2);
        // Redaction: the serialized form carries neither agent identity nor
        // coordinates.
        let json = serde_json::to_value(&view).unwrap();
        let rendered = json.to_string();
        assert!(!rendered.contains("Agent Kumar"));
        assert!(!rendered.contains("latitude"));
        assert!(!rendered.contains("sender"));
        assert!(!rendered.contains("recipient"));
    }

    #[test]
    fn unassociated_user_gets_public_view() {
        let shipment = shipment_with_agent_event(AccountId::new());
        let stranger = Caller::account(AccountId::new(), Role::User, "stranger@example.com");
        assert!(matches!(
            project_shipment(&shipment, &stranger, Utc::now()),
            ShipmentView::Public(_)
        ));
    }

    #[test]
    fn creator_gets_full_view() {
        let creator = AccountId::new();
        let shipment = shipment_with_agent_event(creator);
        let caller = Caller::account(creator, Role::User, "someone@example.com");

        let ShipmentView::Full(view) = project_shipment(&shipment, &caller, Utc::now()) else {
            panic!("creator must get the full projection");
        };
        assert_eq!(view.sender.name, "Asha Verma");
        assert!(view.events[1].agent.is_some());
        assert!((view.package_volume_m3 - 0.001).abs() < 1e-9);
    }

    #[test]
    fn recipient_email_match_grants_full_view() {
        let shipment = shipment_with_agent_event(AccountId::new());
        let caller = Caller::account(AccountId::new(), Role::User, "RAVI@example.com");
        assert!(matches!(
            project_shipment(&shipment, &caller, Utc::now()),
            ShipmentView::Full(_)
        ));
    }

    #[test]
    fn agent_gets_full_view_of_any_shipment() {
        let shipment = shipment_with_agent_event(AccountId::new());
        let caller = Caller::account(AccountId::new(), Role::Agent, "ops@courier.example");
        let ShipmentView::Full(view) = project_shipment(&shipment, &caller, Utc::now()) else {
            panic!("agent must get the full projection");
        };
        assert_eq!(view.delivery_attempts, 0);
        assert_eq!(
            view.delivery_window.start.date_naive(),
            view.estimated_delivery.date_naive()
        );
    }
}
