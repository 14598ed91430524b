//! Application services: the operation surface any transport exposes.

pub mod error;
pub mod identity;
pub mod shipments;

pub use error::ServiceError;
pub use identity::{IdentityService, NewAccount};
pub use shipments::{
    DashboardStats, NewShipment, PagedShipments, ShipmentListQuery, ShipmentService,
    TrackingEventInput,
};
