//! Shipment aggregate (event-sourced).
//!
//! Owns the delivery lifecycle: status, derived progress, the append-only
//! tracking-event history, delivery-attempt accounting and terminal
//! timestamps. Status and progress are mutated exclusively through `apply`.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use parceltrace_core::{Aggregate, AccountId, AggregateRoot, DomainError, ShipmentId};
use parceltrace_events::Event;

use crate::package::{PackageInfo, PaymentInfo, PaymentMethod, PaymentStatus, ServiceInfo};
use crate::party::Party;
use crate::status::{can_transition, ShipmentStatus};
use crate::tracking_number::TrackingNumber;

/// Delivery attempts are capped; the cap triggers an automatic exception.
pub const MAX_DELIVERY_ATTEMPTS: u8 = 3;

/// Description of the synthetic event recorded at creation.
const PLACEMENT_MESSAGE: &str = "Order placed; shipment awaiting pickup";

/// Description of the automatic exception after the final failed attempt.
const MAX_ATTEMPTS_MESSAGE: &str = "Maximum delivery attempts reached; returning to sender";

// ─────────────────────────────────────────────────────────────────────────────
// Tracking Event
// ─────────────────────────────────────────────────────────────────────────────

/// Geographic coordinates attached to a tracking event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Identity of the agent who recorded an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStamp {
    pub agent_id: AccountId,
    pub name: String,
    pub contact: String,
}

/// One entry in a shipment's append-only history.
///
/// Timestamps are caller-supplied business time; the sequence is ordered by
/// insertion, not by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: ShipmentStatus,
    pub location: String,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    pub coordinates: Option<GeoPoint>,
    pub agent: Option<AgentStamp>,
}

/// Derived delivery window around the estimated-delivery date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shipment Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Shipment aggregate.
///
/// # Invariants
/// - The tracking number is immutable once assigned.
/// - `progress` is the fixed function of `status`, except across `Exception`
///   where it is frozen at its pre-exception value.
/// - The tracking-event sequence is append-only, in insertion order.
/// - `delivery_attempts` never exceeds [`MAX_DELIVERY_ATTEMPTS`].
/// - Terminal states accept no further events.
#[derive(Debug, Clone)]
pub struct Shipment {
    id: ShipmentId,
    tracking_number: Option<TrackingNumber>,
    sender: Party,
    recipient: Party,
    package: PackageInfo,
    service: ServiceInfo,
    status: ShipmentStatus,
    progress: u8,
    events: Vec<TrackingEvent>,
    payment: PaymentInfo,
    delivery_attempts: u8,
    created_by: Option<AccountId>,
    assigned_agent: Option<AccountId>,
    active: bool,
    delivered_at: Option<DateTime<Utc>>,
    returned_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Shipment {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ShipmentId) -> Self {
        Self {
            id,
            tracking_number: None,
            sender: Party::default(),
            recipient: Party::default(),
            package: PackageInfo::default(),
            service: ServiceInfo::default(),
            status: ShipmentStatus::OrderPlaced,
            progress: 0,
            events: Vec::new(),
            payment: PaymentInfo::default(),
            delivery_attempts: 0,
            created_by: None,
            assigned_agent: None,
            active: true,
            delivered_at: None,
            returned_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ShipmentId {
        self.id
    }

    pub fn tracking_number(&self) -> Option<&TrackingNumber> {
        self.tracking_number.as_ref()
    }

    pub fn sender(&self) -> &Party {
        &self.sender
    }

    pub fn recipient(&self) -> &Party {
        &self.recipient
    }

    pub fn package(&self) -> &PackageInfo {
        &self.package
    }

    pub fn service(&self) -> &ServiceInfo {
        &self.service
    }

    pub fn status(&self) -> ShipmentStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn events(&self) -> &[TrackingEvent] {
        &self.events
    }

    pub fn payment(&self) -> PaymentInfo {
        self.payment
    }

    pub fn delivery_attempts(&self) -> u8 {
        self.delivery_attempts
    }

    pub fn created_by(&self) -> Option<AccountId> {
        self.created_by
    }

    pub fn assigned_agent(&self) -> Option<AccountId> {
        self.assigned_agent
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        self.returned_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived read-time fields (never stored)
    // ─────────────────────────────────────────────────────────────────────────

    /// A shipment is delayed once the estimated delivery has passed without
    /// a delivery.
    pub fn is_delayed(&self, now: DateTime<Utc>) -> bool {
        self.status != ShipmentStatus::Delivered && now > self.service.estimated_delivery
    }

    /// 09:00–18:00 window on the estimated-delivery date.
    pub fn delivery_window(&self) -> DeliveryWindow {
        let date = self.service.estimated_delivery.date_naive();
        let start = NaiveTime::from_hms_opt(9, 0, 0).expect("09:00 is a valid time");
        let end = NaiveTime::from_hms_opt(18, 0, 0).expect("18:00 is a valid time");
        DeliveryWindow {
            start: Utc.from_utc_datetime(&date.and_time(start)),
            end: Utc.from_utc_datetime(&date.and_time(end)),
        }
    }

    /// An account is associated with a shipment if it created it, or if its
    /// registered email matches the sender or recipient contact email.
    pub fn is_associated_with(&self, account_id: AccountId, account_email: &str) -> bool {
        self.created_by == Some(account_id)
            || self.sender.email_matches(account_email)
            || self.recipient.email_matches(account_email)
    }
}

impl AggregateRoot for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command: create a shipment with an already-generated tracking number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateShipment {
    pub shipment_id: ShipmentId,
    pub tracking_number: TrackingNumber,
    pub sender: Party,
    pub recipient: Party,
    pub package: PackageInfo,
    pub service: ServiceInfo,
    pub payment: PaymentInfo,
    pub created_by: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: append a tracking event and advance the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordTrackingEvent {
    pub shipment_id: ShipmentId,
    pub event: TrackingEvent,
}

/// Command: record one delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDeliveryAttempt {
    pub shipment_id: ShipmentId,
    pub location: String,
    pub agent: Option<AgentStamp>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: assign an agent to the shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignAgent {
    pub shipment_id: ShipmentId,
    pub agent_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: update the payment state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub shipment_id: ShipmentId,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub occurred_at: DateTime<Utc>,
}

/// Command: soft-deactivate the shipment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeactivateShipment {
    pub shipment_id: ShipmentId,
    pub occurred_at: DateTime<Utc>,
}

/// All shipment commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShipmentCommand {
    Create(CreateShipment),
    RecordTrackingEvent(RecordTrackingEvent),
    RecordDeliveryAttempt(RecordDeliveryAttempt),
    AssignAgent(AssignAgent),
    RecordPayment(RecordPayment),
    Deactivate(DeactivateShipment),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Event: ShipmentCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentCreated {
    pub shipment_id: ShipmentId,
    pub tracking_number: TrackingNumber,
    pub sender: Party,
    pub recipient: Party,
    pub package: PackageInfo,
    pub service: ServiceInfo,
    pub payment: PaymentInfo,
    pub created_by: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TrackingEventRecorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEventRecorded {
    pub shipment_id: ShipmentId,
    pub event: TrackingEvent,
}

/// Event: DeliveryAttemptRecorded (carries the post-increment counter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttemptRecorded {
    pub shipment_id: ShipmentId,
    pub attempts: u8,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AgentAssigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAssigned {
    pub shipment_id: ShipmentId,
    pub agent_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub shipment_id: ShipmentId,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentDeactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentDeactivated {
    pub shipment_id: ShipmentId,
    pub occurred_at: DateTime<Utc>,
}

/// All shipment events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShipmentEvent {
    Created(ShipmentCreated),
    TrackingEventRecorded(TrackingEventRecorded),
    DeliveryAttemptRecorded(DeliveryAttemptRecorded),
    AgentAssigned(AgentAssigned),
    PaymentRecorded(PaymentRecorded),
    Deactivated(ShipmentDeactivated),
}

impl Event for ShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShipmentEvent::Created(_) => "shipment.created",
            ShipmentEvent::TrackingEventRecorded(_) => "shipment.tracking_event_recorded",
            ShipmentEvent::DeliveryAttemptRecorded(_) => "shipment.delivery_attempt_recorded",
            ShipmentEvent::AgentAssigned(_) => "shipment.agent_assigned",
            ShipmentEvent::PaymentRecorded(_) => "shipment.payment_recorded",
            ShipmentEvent::Deactivated(_) => "shipment.deactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ShipmentEvent::Created(e) => e.occurred_at,
            ShipmentEvent::TrackingEventRecorded(e) => e.event.occurred_at,
            ShipmentEvent::DeliveryAttemptRecorded(e) => e.occurred_at,
            ShipmentEvent::AgentAssigned(e) => e.occurred_at,
            ShipmentEvent::PaymentRecorded(e) => e.occurred_at,
            ShipmentEvent::Deactivated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Shipment {
    type Command = ShipmentCommand;
    type Event = ShipmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ShipmentEvent::Created(e) => self.apply_created(e),
            ShipmentEvent::TrackingEventRecorded(e) => self.apply_tracking_event(e),
            ShipmentEvent::DeliveryAttemptRecorded(e) => self.apply_delivery_attempt(e),
            ShipmentEvent::AgentAssigned(e) => self.apply_agent_assigned(e),
            ShipmentEvent::PaymentRecorded(e) => self.apply_payment_recorded(e),
            ShipmentEvent::Deactivated(e) => self.apply_deactivated(e),
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ShipmentCommand::Create(cmd) => self.handle_create(cmd),
            ShipmentCommand::RecordTrackingEvent(cmd) => self.handle_record_tracking_event(cmd),
            ShipmentCommand::RecordDeliveryAttempt(cmd) => self.handle_record_delivery_attempt(cmd),
            ShipmentCommand::AssignAgent(cmd) => self.handle_assign_agent(cmd),
            ShipmentCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
            ShipmentCommand::Deactivate(cmd) => self.handle_deactivate(cmd),
        }
    }
}

impl Shipment {
    // ─────────────────────────────────────────────────────────────────────────
    // Command Handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn ensure_created_and_active(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if !self.active {
            return Err(DomainError::invariant("shipment is deactivated"));
        }
        Ok(())
    }

    fn ensure_shipment_id(&self, shipment_id: ShipmentId) -> Result<(), DomainError> {
        if self.id != shipment_id {
            return Err(DomainError::invariant("shipment_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateShipment) -> Result<Vec<ShipmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("shipment already exists"));
        }

        cmd.sender.validate("sender")?;
        cmd.recipient.validate("recipient")?;
        cmd.package.validate()?;

        Ok(vec![ShipmentEvent::Created(ShipmentCreated {
            shipment_id: cmd.shipment_id,
            tracking_number: cmd.tracking_number.clone(),
            sender: cmd.sender.clone(),
            recipient: cmd.recipient.clone(),
            package: cmd.package.clone(),
            service: cmd.service.clone(),
            payment: cmd.payment,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_tracking_event(
        &self,
        cmd: &RecordTrackingEvent,
    ) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created_and_active()?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if cmd.event.location.trim().is_empty() {
            return Err(DomainError::validation("event location cannot be empty"));
        }
        if cmd.event.description.trim().is_empty() {
            return Err(DomainError::validation("event description cannot be empty"));
        }
        if !can_transition(self.status, cmd.event.status) {
            return Err(DomainError::invariant(format!(
                "illegal status transition: {} -> {}",
                self.status, cmd.event.status
            )));
        }

        Ok(vec![ShipmentEvent::TrackingEventRecorded(
            TrackingEventRecorded {
                shipment_id: cmd.shipment_id,
                event: cmd.event.clone(),
            },
        )])
    }

    /// Increment the capped attempt counter; the cap triggers the automatic
    /// "returning to sender" exception through the same transition path.
    fn handle_record_delivery_attempt(
        &self,
        cmd: &RecordDeliveryAttempt,
    ) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created_and_active()?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::invariant(
                "cannot record delivery attempts on a terminal shipment",
            ));
        }
        if self.delivery_attempts >= MAX_DELIVERY_ATTEMPTS {
            return Err(DomainError::invariant("delivery attempts exhausted"));
        }

        let attempts = self.delivery_attempts + 1;
        let mut events = vec![ShipmentEvent::DeliveryAttemptRecorded(
            DeliveryAttemptRecorded {
                shipment_id: cmd.shipment_id,
                attempts,
                occurred_at: cmd.occurred_at,
            },
        )];

        if attempts == MAX_DELIVERY_ATTEMPTS {
            events.push(ShipmentEvent::TrackingEventRecorded(TrackingEventRecorded {
                shipment_id: cmd.shipment_id,
                event: TrackingEvent {
                    status: ShipmentStatus::Exception,
                    location: cmd.location.clone(),
                    description: MAX_ATTEMPTS_MESSAGE.to_string(),
                    occurred_at: cmd.occurred_at,
                    coordinates: None,
                    agent: cmd.agent.clone(),
                },
            }));
        }

        Ok(events)
    }

    fn handle_assign_agent(&self, cmd: &AssignAgent) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created_and_active()?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::invariant(
                "cannot assign an agent to a terminal shipment",
            ));
        }
        if self.assigned_agent == Some(cmd.agent_id) {
            return Ok(vec![]);
        }

        Ok(vec![ShipmentEvent::AgentAssigned(AgentAssigned {
            shipment_id: cmd.shipment_id,
            agent_id: cmd.agent_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_payment(
        &self,
        cmd: &RecordPayment,
    ) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_created_and_active()?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        Ok(vec![ShipmentEvent::PaymentRecorded(PaymentRecorded {
            shipment_id: cmd.shipment_id,
            status: cmd.status,
            method: cmd.method,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(
        &self,
        cmd: &DeactivateShipment,
    ) -> Result<Vec<ShipmentEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if !self.active {
            return Err(DomainError::invariant("shipment already deactivated"));
        }

        Ok(vec![ShipmentEvent::Deactivated(ShipmentDeactivated {
            shipment_id: cmd.shipment_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Appliers
    // ─────────────────────────────────────────────────────────────────────────

    fn apply_created(&mut self, e: &ShipmentCreated) {
        self.id = e.shipment_id;
        self.tracking_number = Some(e.tracking_number.clone());
        self.sender = e.sender.clone();
        self.recipient = e.recipient.clone();
        self.package = e.package.clone();
        self.service = e.service.clone();
        self.payment = e.payment;
        self.created_by = Some(e.created_by);
        self.status = ShipmentStatus::OrderPlaced;
        self.progress = ShipmentStatus::OrderPlaced.progress().unwrap_or(0);
        self.created_at = Some(e.occurred_at);
        self.active = true;
        self.created = true;

        // Synthetic placement event: location is the sender's city/state.
        self.events.push(TrackingEvent {
            status: ShipmentStatus::OrderPlaced,
            location: e.sender.address.city_state(),
            description: PLACEMENT_MESSAGE.to_string(),
            occurred_at: e.occurred_at,
            coordinates: None,
            agent: None,
        });
    }

    fn apply_tracking_event(&mut self, e: &TrackingEventRecorded) {
        let event = &e.event;
        self.events.push(event.clone());
        self.status = event.status;
        // Exception freezes progress at its pre-exception value.
        if let Some(progress) = event.status.progress() {
            self.progress = progress;
        }

        match event.status {
            ShipmentStatus::Delivered => self.delivered_at = Some(event.occurred_at),
            ShipmentStatus::Returned => self.returned_at = Some(event.occurred_at),
            ShipmentStatus::Cancelled => {
                self.cancelled_at = Some(event.occurred_at);
                self.cancellation_reason = Some(event.description.clone());
            }
            _ => {}
        }
    }

    fn apply_delivery_attempt(&mut self, e: &DeliveryAttemptRecorded) {
        self.delivery_attempts = e.attempts.min(MAX_DELIVERY_ATTEMPTS);
    }

    fn apply_agent_assigned(&mut self, e: &AgentAssigned) {
        self.assigned_agent = Some(e.agent_id);
    }

    fn apply_payment_recorded(&mut self, e: &PaymentRecorded) {
        self.payment = PaymentInfo {
            status: e.status,
            method: e.method,
        };
    }

    fn apply_deactivated(&mut self, _e: &ShipmentDeactivated) {
        self.active = false;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
