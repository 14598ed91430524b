//! Shipment status lifecycle and transition rules.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use parceltrace_core::DomainError;

/// Shipment status lifecycle.
///
/// Forward chain: `OrderPlaced → InTransit → OutForDelivery → Delivered`,
/// with side exits `Returned` / `Cancelled` (terminal) and `Exception`
/// (non-terminal, re-enterable from any non-terminal state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    OrderPlaced,
    InTransit,
    OutForDelivery,
    Delivered,
    Returned,
    Cancelled,
    Exception,
}

impl ShipmentStatus {
    /// Progress percentage for this status.
    ///
    /// `None` for `Exception`: an exception freezes progress at its
    /// pre-exception value.
    pub fn progress(&self) -> Option<u8> {
        match self {
            ShipmentStatus::OrderPlaced => Some(10),
            ShipmentStatus::InTransit => Some(50),
            ShipmentStatus::OutForDelivery => Some(80),
            ShipmentStatus::Delivered => Some(100),
            ShipmentStatus::Returned => Some(100),
            ShipmentStatus::Cancelled => Some(0),
            ShipmentStatus::Exception => None,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::Delivered | ShipmentStatus::Returned | ShipmentStatus::Cancelled
        )
    }

    /// Position along the forward delivery chain, if the status is on it.
    fn forward_rank(&self) -> Option<u8> {
        match self {
            ShipmentStatus::OrderPlaced => Some(0),
            ShipmentStatus::InTransit => Some(1),
            ShipmentStatus::OutForDelivery => Some(2),
            ShipmentStatus::Delivered => Some(3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::OrderPlaced => "order_placed",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::OutForDelivery => "out_for_delivery",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Returned => "returned",
            ShipmentStatus::Cancelled => "cancelled",
            ShipmentStatus::Exception => "exception",
        }
    }

    /// All statuses, in lifecycle order (used for dashboard breakdowns).
    pub fn all() -> [ShipmentStatus; 7] {
        [
            ShipmentStatus::OrderPlaced,
            ShipmentStatus::InTransit,
            ShipmentStatus::OutForDelivery,
            ShipmentStatus::Delivered,
            ShipmentStatus::Returned,
            ShipmentStatus::Cancelled,
            ShipmentStatus::Exception,
        ]
    }
}

impl core::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "order_placed" => Ok(ShipmentStatus::OrderPlaced),
            "in_transit" => Ok(ShipmentStatus::InTransit),
            "out_for_delivery" => Ok(ShipmentStatus::OutForDelivery),
            "delivered" => Ok(ShipmentStatus::Delivered),
            "returned" => Ok(ShipmentStatus::Returned),
            "cancelled" => Ok(ShipmentStatus::Cancelled),
            "exception" => Ok(ShipmentStatus::Exception),
            other => Err(DomainError::validation(format!(
                "unknown shipment status: {other}"
            ))),
        }
    }
}

/// Transition legality table.
///
/// - Terminal states accept nothing further.
/// - `Exception` is reachable from any non-terminal state.
/// - From `Exception`, any non-terminal forward state or terminal state is
///   reachable (resume or exit).
/// - Along the forward chain, movement is monotonic; repeating the current
///   non-terminal status is allowed (carrier re-scans).
/// - `Returned` / `Cancelled` are reachable from any non-terminal state.
pub fn can_transition(from: ShipmentStatus, to: ShipmentStatus) -> bool {
    if from.is_terminal() {
        return false;
    }

    match to {
        ShipmentStatus::Exception => true,
        ShipmentStatus::Returned | ShipmentStatus::Cancelled => true,
        _ => match (from.forward_rank(), to.forward_rank()) {
            // Forward chain: never move backward.
            (Some(f), Some(t)) => t >= f,
            // Resuming out of an exception.
            (None, Some(_)) => from == ShipmentStatus::Exception,
            _ => false,
        },
    }
}
