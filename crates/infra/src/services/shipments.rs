//! Shipment service: creation, lifecycle mutations, queries and dashboard
//! aggregation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use parceltrace_core::{AccountId, DomainError, ShipmentId};
use parceltrace_events::{EventBus, EventEnvelope};
use parceltrace_shipments::{
    AgentStamp, AssignAgent, CreateShipment, DeactivateShipment, GeoPoint, InsuranceTerms,
    PackageInfo, Party, PaymentInfo, PaymentMethod, PaymentStatus, Priority,
    RecordDeliveryAttempt, RecordPayment, RecordTrackingEvent, ServiceInfo, ServiceType, Shipment,
    ShipmentCommand, ShipmentStatus, TrackingEvent, TrackingNumber, TrackingNumberGenerator,
};

use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::EventStore;
use crate::projections::shipments::{ShipmentDirectory, SHIPMENT_AGGREGATE_TYPE};
use crate::read_model::ReadStore;
use crate::services::ServiceError;

/// Creation input; the tracking number and estimated delivery are derived
/// here, never supplied by the caller.
#[derive(Debug, Clone)]
pub struct NewShipment {
    pub sender: Party,
    pub recipient: Party,
    pub package: PackageInfo,
    pub service_type: ServiceType,
    pub priority: Priority,
    pub cost: u64,
    pub insurance: InsuranceTerms,
    pub payment_method: PaymentMethod,
}

/// Tracking-event input; `occurred_at` defaults to submission time.
#[derive(Debug, Clone)]
pub struct TrackingEventInput {
    pub status: ShipmentStatus,
    pub location: String,
    pub description: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub coordinates: Option<GeoPoint>,
    pub agent: Option<AgentStamp>,
}

/// List query: 1-based page, limit capped at 100, optional status filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShipmentListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<ShipmentStatus>,
}

const DEFAULT_PAGE_LIMIT: u32 = 20;
const MAX_PAGE_LIMIT: u32 = 100;

/// One page of shipments, newest first.
#[derive(Debug, Clone)]
pub struct PagedShipments {
    pub items: Vec<Shipment>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
}

/// Point-in-time dashboard snapshot over all active shipments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_active: u64,
    pub created_today: u64,
    pub in_progress: u64,
    pub delivered: u64,
    pub delayed: u64,
    pub by_status: BTreeMap<String, u64>,
}

pub struct ShipmentService<ES, B, RS>
where
    RS: ReadStore<ShipmentId, Shipment>,
{
    dispatcher: Arc<CommandDispatcher<ES, B>>,
    shipments: Arc<ShipmentDirectory<RS>>,
    generator: TrackingNumberGenerator,
}

impl<ES, B, RS> ShipmentService<ES, B, RS>
where
    ES: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    RS: ReadStore<ShipmentId, Shipment>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<ES, B>>,
        shipments: Arc<ShipmentDirectory<RS>>,
        generator: TrackingNumberGenerator,
    ) -> Self {
        Self {
            dispatcher,
            shipments,
            generator,
        }
    }

    /// Create a shipment with a freshly generated tracking number.
    ///
    /// Generation failure (retry budget exhausted) aborts the creation with
    /// nothing persisted.
    pub fn create(
        &self,
        input: NewShipment,
        created_by: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(ShipmentId, TrackingNumber), ServiceError> {
        let tracking_number = self
            .generator
            .generate(|candidate| self.shipments.tracking_number_exists(candidate))?;

        let shipment_id = ShipmentId::new();
        let service = ServiceInfo::quoted(
            input.service_type,
            input.priority,
            input.cost,
            input.insurance,
            now,
        );

        self.dispatcher.dispatch::<Shipment>(
            shipment_id.into(),
            SHIPMENT_AGGREGATE_TYPE,
            ShipmentCommand::Create(CreateShipment {
                shipment_id,
                tracking_number: tracking_number.clone(),
                sender: input.sender,
                recipient: input.recipient,
                package: input.package,
                service,
                payment: PaymentInfo {
                    status: PaymentStatus::Pending,
                    method: input.payment_method,
                },
                created_by,
                occurred_at: now,
            }),
            |id| Shipment::empty(id.into()),
        )?;

        Ok((shipment_id, tracking_number))
    }

    /// Case-insensitive lookup restricted to active shipments.
    ///
    /// Absent is `Ok(None)`, not an error; a malformed code is a validation
    /// error.
    pub fn find_by_tracking_number(&self, code: &str) -> Result<Option<Shipment>, ServiceError> {
        let tracking_number = TrackingNumber::parse(code)?;
        Ok(self
            .shipments
            .find_by_tracking_number(&tracking_number)
            .filter(Shipment::is_active))
    }

    fn resolve_active(&self, code: &str) -> Result<Shipment, ServiceError> {
        self.find_by_tracking_number(code)?
            .ok_or_else(|| DomainError::NotFound.into())
    }

    /// Append a tracking event, advancing status/progress atomically.
    pub fn record_tracking_event(
        &self,
        code: &str,
        input: TrackingEventInput,
        now: DateTime<Utc>,
    ) -> Result<usize, ServiceError> {
        let shipment = self.resolve_active(code)?;

        let committed = self.dispatcher.dispatch::<Shipment>(
            shipment.id_typed().into(),
            SHIPMENT_AGGREGATE_TYPE,
            ShipmentCommand::RecordTrackingEvent(RecordTrackingEvent {
                shipment_id: shipment.id_typed(),
                event: TrackingEvent {
                    status: input.status,
                    location: input.location,
                    description: input.description,
                    occurred_at: input.occurred_at.unwrap_or(now),
                    coordinates: input.coordinates,
                    agent: input.agent,
                },
            }),
            |id| Shipment::empty(id.into()),
        )?;

        Ok(committed.len())
    }

    /// Record one delivery attempt; the third composes the automatic
    /// "returning to sender" exception.
    pub fn record_delivery_attempt(
        &self,
        code: &str,
        location: String,
        agent: Option<AgentStamp>,
        now: DateTime<Utc>,
    ) -> Result<usize, ServiceError> {
        let shipment = self.resolve_active(code)?;

        let committed = self.dispatcher.dispatch::<Shipment>(
            shipment.id_typed().into(),
            SHIPMENT_AGGREGATE_TYPE,
            ShipmentCommand::RecordDeliveryAttempt(RecordDeliveryAttempt {
                shipment_id: shipment.id_typed(),
                location,
                agent,
                occurred_at: now,
            }),
            |id| Shipment::empty(id.into()),
        )?;

        Ok(committed.len())
    }

    pub fn assign_agent(
        &self,
        code: &str,
        agent_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<usize, ServiceError> {
        let shipment = self.resolve_active(code)?;

        let committed = self.dispatcher.dispatch::<Shipment>(
            shipment.id_typed().into(),
            SHIPMENT_AGGREGATE_TYPE,
            ShipmentCommand::AssignAgent(AssignAgent {
                shipment_id: shipment.id_typed(),
                agent_id,
                occurred_at: now,
            }),
            |id| Shipment::empty(id.into()),
        )?;

        Ok(committed.len())
    }

    pub fn record_payment(
        &self,
        code: &str,
        status: PaymentStatus,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<usize, ServiceError> {
        let shipment = self.resolve_active(code)?;

        let committed = self.dispatcher.dispatch::<Shipment>(
            shipment.id_typed().into(),
            SHIPMENT_AGGREGATE_TYPE,
            ShipmentCommand::RecordPayment(RecordPayment {
                shipment_id: shipment.id_typed(),
                status,
                method,
                occurred_at: now,
            }),
            |id| Shipment::empty(id.into()),
        )?;

        Ok(committed.len())
    }

    /// Soft-deactivate a shipment; it disappears from lookups and lists but
    /// its tracking number stays reserved.
    pub fn deactivate(&self, code: &str, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let shipment = self.resolve_active(code)?;

        let committed = self.dispatcher.dispatch::<Shipment>(
            shipment.id_typed().into(),
            SHIPMENT_AGGREGATE_TYPE,
            ShipmentCommand::Deactivate(DeactivateShipment {
                shipment_id: shipment.id_typed(),
                occurred_at: now,
            }),
            |id| Shipment::empty(id.into()),
        )?;

        Ok(committed.len())
    }

    /// Active shipments associated with the account (creator, or
    /// sender/recipient email match), newest first, paginated.
    pub fn find_by_user(
        &self,
        account_id: AccountId,
        account_email: &str,
        query: ShipmentListQuery,
    ) -> PagedShipments {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);

        let mut items: Vec<Shipment> = self
            .shipments
            .list()
            .into_iter()
            .filter(Shipment::is_active)
            .filter(|s| s.is_associated_with(account_id, account_email))
            .filter(|s| query.status.is_none_or(|status| s.status() == status))
            .collect();

        items.sort_by_key(|s| std::cmp::Reverse(s.created_at()));
        let total = items.len();

        let start = ((page - 1) as usize).saturating_mul(limit as usize);
        let items = if start >= items.len() {
            Vec::new()
        } else {
            items
                .into_iter()
                .skip(start)
                .take(limit as usize)
                .collect()
        };

        PagedShipments {
            items,
            page,
            limit,
            total,
        }
    }

    /// Point-in-time dashboard snapshot (never incrementally maintained).
    pub fn dashboard(&self, now: DateTime<Utc>) -> DashboardStats {
        let today = now.date_naive();
        let mut stats = DashboardStats {
            total_active: 0,
            created_today: 0,
            in_progress: 0,
            delivered: 0,
            delayed: 0,
            by_status: BTreeMap::new(),
        };

        for shipment in self.shipments.list() {
            if !shipment.is_active() {
                continue;
            }
            stats.total_active += 1;

            if shipment
                .created_at()
                .is_some_and(|at| at.date_naive() == today)
            {
                stats.created_today += 1;
            }

            let status = shipment.status();
            match status {
                ShipmentStatus::OrderPlaced
                | ShipmentStatus::InTransit
                | ShipmentStatus::OutForDelivery => stats.in_progress += 1,
                ShipmentStatus::Delivered => stats.delivered += 1,
                _ => {}
            }

            if !status.is_terminal() && shipment.is_delayed(now) {
                stats.delayed += 1;
            }

            *stats.by_status.entry(status.as_str().to_string()).or_insert(0) += 1;
        }

        stats
    }
}
