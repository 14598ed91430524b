//! Shipment directory: the query-side view of the shipment ledger.
//!
//! The read model is the rehydrated [`Shipment`] aggregate itself, folded
//! from the event stream, plus a unique tracking-number index. The index is
//! the storage-side uniqueness guard for tracking numbers; the generator's
//! existence pre-check only reduces collision probability.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use parceltrace_core::{Aggregate, AggregateId, ShipmentId};
use parceltrace_events::EventEnvelope;
use parceltrace_shipments::{Shipment, ShipmentEvent, TrackingNumber};

use crate::projections::ProjectionError;
use crate::read_model::ReadStore;

/// Aggregate type tag for shipment streams.
pub const SHIPMENT_AGGREGATE_TYPE: &str = "shipment";

#[derive(Debug)]
pub struct ShipmentDirectory<S>
where
    S: ReadStore<ShipmentId, Shipment>,
{
    store: S,
    /// tracking number → shipment (covers active and inactive shipments).
    index: RwLock<HashMap<String, ShipmentId>>,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> ShipmentDirectory<S>
where
    S: ReadStore<ShipmentId, Shipment>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            index: RwLock::new(HashMap::new()),
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn get_cursor(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors.get(&aggregate_id).unwrap_or(&0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub fn get(&self, shipment_id: &ShipmentId) -> Option<Shipment> {
        self.store.get(shipment_id)
    }

    /// Lookup by tracking number (active and inactive records).
    pub fn find_by_tracking_number(&self, tracking_number: &TrackingNumber) -> Option<Shipment> {
        let id = {
            let index = self.index.read().ok()?;
            *index.get(tracking_number.as_str())?
        };
        self.store.get(&id)
    }

    /// Uniqueness pre-check used by the generator.
    pub fn tracking_number_exists(&self, tracking_number: &TrackingNumber) -> bool {
        self.index
            .read()
            .map(|index| index.contains_key(tracking_number.as_str()))
            .unwrap_or(false)
    }

    pub fn list(&self) -> Vec<Shipment> {
        self.store.list()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != SHIPMENT_AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: ShipmentEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let shipment_id = event_shipment_id(&ev);
        if AggregateId::from(shipment_id) != aggregate_id {
            return Err(ProjectionError::IdentityMismatch(
                "event shipment_id does not match envelope aggregate_id".to_string(),
            ));
        }

        // The unique index is authoritative: a duplicate tracking number is
        // rejected before it can shadow an existing record.
        if let ShipmentEvent::Created(created) = &ev {
            let mut index = self
                .index
                .write()
                .map_err(|_| ProjectionError::IdentityMismatch("index lock poisoned".to_string()))?;
            match index.get(created.tracking_number.as_str()) {
                Some(existing) if *existing != shipment_id => {
                    return Err(ProjectionError::UniqueViolation(format!(
                        "tracking number {} already assigned",
                        created.tracking_number
                    )));
                }
                _ => {
                    index.insert(created.tracking_number.as_str().to_string(), shipment_id);
                }
            }
        }

        let mut shipment = self
            .store
            .get(&shipment_id)
            .unwrap_or_else(|| Shipment::empty(shipment_id));
        shipment.apply(&ev);
        self.store.upsert(shipment_id, shipment);

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }
}

fn event_shipment_id(event: &ShipmentEvent) -> ShipmentId {
    match event {
        ShipmentEvent::Created(e) => e.shipment_id,
        ShipmentEvent::TrackingEventRecorded(e) => e.shipment_id,
        ShipmentEvent::DeliveryAttemptRecorded(e) => e.shipment_id,
        ShipmentEvent::AgentAssigned(e) => e.shipment_id,
        ShipmentEvent::PaymentRecorded(e) => e.shipment_id,
        ShipmentEvent::Deactivated(e) => e.shipment_id,
    }
}
