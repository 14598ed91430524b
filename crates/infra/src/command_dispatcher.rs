//! Command execution pipeline (application-level orchestration).
//!
//! Orchestrates the full event-sourcing lifecycle for one aggregate:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store
//!   ↓
//! 2. Rehydrate aggregate (apply historical events to rebuild state)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events to store (append-only, optimistic concurrency check)
//!   ↓
//! 5. Publish events to bus (for projections, handlers, etc.)
//! ```
//!
//! The optimistic concurrency check is what serializes concurrent mutations
//! of the same shipment/account: the loser of a race observes a
//! `Concurrency` error instead of interleaving a corrupted state. Events are
//! persisted before publication, so a publish failure leaves the store as
//! source of truth (at-least-once delivery; consumers are idempotent).
//!
//! This module contains no IO itself; it composes infrastructure traits.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use parceltrace_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use parceltrace_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (e.g. stale aggregate version).
    Concurrency(String),
    /// Domain validation failure (deterministic).
    Validation(String),
    /// Domain invariant failure (deterministic).
    InvariantViolation(String),
    /// Uniqueness conflict; the message names the offending field.
    Conflict(String),
    /// Domain authorization failure.
    Unauthorized,
    /// Domain-level not found.
    NotFound,
    /// A bounded resource (e.g. a retry budget) was exhausted.
    ResourceExhausted(String),
    /// Failed to deserialize historical event payloads into the aggregate event type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
            DomainError::ResourceExhausted(msg) => DispatchError::ResourceExhausted(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and bus so tests can run fully in-memory and a
/// persistent backend can be swapped in without touching domain code.
/// Aggregates must be deterministic, side-effect free and version-aware.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full event-sourcing pipeline.
    ///
    /// The `make_aggregate` closure produces a fresh (not-yet-created)
    /// aggregate for rehydration, e.g. `|id| Shipment::empty(id.into())`.
    ///
    /// Returns the committed `StoredEvent`s (with assigned sequence numbers)
    /// on success. On a concurrent modification the append fails with
    /// `DispatchError::Concurrency`; callers may reload and retry.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: parceltrace_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(aggregate_id, aggregate_type.clone(), Uuid::now_v7(), ev)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // 5) Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Ensure the stream belongs to the right aggregate and is monotonically
    // increasing by sequence number, even if a buggy backend misbehaves.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Ensure deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parceltrace_events::InMemoryEventBus;
    use parceltrace_shipments::{
        Address, CreateShipment, Dimensions, InsuranceTerms, PackageInfo, Party, PaymentInfo,
        Priority, RecordTrackingEvent, ServiceInfo, ServiceType, Shipment, ShipmentCommand,
        ShipmentStatus, TrackingEvent, TrackingNumber,
    };
    use parceltrace_core::{AccountId, ShipmentId};
    use std::sync::Arc;

    use crate::event_store::InMemoryEventStore;

    type TestDispatcher =
        CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn dispatcher() -> TestDispatcher {
        CommandDispatcher::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryEventBus::new()),
        )
    }

    fn party(city: &str) -> Party {
        Party {
            name: "Test Party".to_string(),
            email: "party@example.com".to_string(),
            phone: "+91-9000000000".to_string(),
            address: Address {
                street: "1 Lane".to_string(),
                city: city.to_string(),
                state: "MH".to_string(),
                postal_code: "400001".to_string(),
                country: "IN".to_string(),
            },
        }
    }

    fn create_cmd(id: ShipmentId) -> ShipmentCommand {
        ShipmentCommand::Create(CreateShipment {
            shipment_id: id,
            tracking_number: TrackingNumber::parse("IND111222333").unwrap(),
            sender: party("Mumbai"),
            recipient: party("Pune"),
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
                ServiceType::Standard,
                Priority::Normal,
                10_000,
                InsuranceTerms::default(),
                Utc::now(),
            ),
            payment: PaymentInfo::default(),
            created_by: AccountId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_persists_and_replays_state() {
        let dispatcher = dispatcher();
        let id = ShipmentId::new();
        let agg: AggregateId = id.into();

        let committed = dispatcher
            .dispatch::<Shipment>(agg, "shipment", create_cmd(id), |a| Shipment::empty(a.into()))
            .unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].sequence_number, 1);

        // Second command rehydrates from the stream and sees the created state.
        let cmd = ShipmentCommand::RecordTrackingEvent(RecordTrackingEvent {
            shipment_id: id,
            event: TrackingEvent {
                status: ShipmentStatus::InTransit,
                location: "Nagpur, MH".to_string(),
                description: "departed facility".to_string(),
                occurred_at: Utc::now(),
                coordinates: None,
                agent: None,
            },
        });
        let committed = dispatcher
            .dispatch::<Shipment>(agg, "shipment", cmd, |a| Shipment::empty(a.into()))
            .unwrap();
        assert_eq!(committed[0].sequence_number, 2);
    }

    #[test]
    fn duplicate_create_is_a_conflict() {
        let dispatcher = dispatcher();
        let id = ShipmentId::new();
        let agg: AggregateId = id.into();

        dispatcher
            .dispatch::<Shipment>(agg, "shipment", create_cmd(id), |a| Shipment::empty(a.into()))
            .unwrap();

        let err = dispatcher
            .dispatch::<Shipment>(agg, "shipment", create_cmd(id), |a| Shipment::empty(a.into()))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Conflict(_)));
    }

    #[test]
    fn events_are_published_after_append() {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let dispatcher = CommandDispatcher::new(store, bus);

        let id = ShipmentId::new();
        dispatcher
            .dispatch::<Shipment>(id.into(), "shipment", create_cmd(id), |a| {
                Shipment::empty(a.into())
            })
            .unwrap();

        let env = sub.try_recv().unwrap();
        assert_eq!(env.aggregate_type(), "shipment");
        assert_eq!(env.sequence_number(), 1);
    }
}
