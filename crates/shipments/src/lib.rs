//! `parceltrace-shipments` — the shipment ledger domain.
//!
//! Owns the tracking state machine, the tracking-number format and generator,
//! and the `Shipment` aggregate with its append-only tracking-event history.

pub mod package;
pub mod party;
pub mod shipment;
pub mod status;
pub mod tracking_number;

pub use package::{
    Dimensions, InsuranceTerms, PackageCategory, PackageInfo, PaymentInfo, PaymentMethod,
    PaymentStatus, Priority, ServiceInfo, ServiceType,
};
pub use party::{Address, Party};
pub use shipment::{
    AgentStamp, AssignAgent, CreateShipment, DeactivateShipment, DeliveryWindow, GeoPoint,
    RecordDeliveryAttempt, RecordPayment, RecordTrackingEvent, Shipment, ShipmentCommand,
    ShipmentEvent, TrackingEvent, MAX_DELIVERY_ATTEMPTS,
};
pub use status::ShipmentStatus;
pub use tracking_number::{TrackingNumber, TrackingNumberGenerator, DEFAULT_GENERATOR_ATTEMPTS};
