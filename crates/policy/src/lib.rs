//! `parceltrace-policy` — caller identity, capability decisions and tiered
//! shipment projections.
//!
//! All role checks live here: call sites ask for a capability, never compare
//! role strings.

pub mod caller;
pub mod policy;
pub mod view;

pub use caller::Caller;
pub use policy::{can_read_full, can_view_dashboard, can_write, WriteOp};
pub use view::{
    project_shipment, FullShipmentView, PublicShipmentView, PublicTrackingEvent, ShipmentView,
};
