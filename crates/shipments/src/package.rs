//! Package, service and payment descriptors.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use parceltrace_core::{DomainError, DomainResult, ValueObject};

/// Package dimensions, declared in centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Dimensions {
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

impl Dimensions {
    /// Volume in cubic meters (reported unit; stored unit is cm).
    pub fn volume_m3(&self) -> f64 {
        (self.length_cm * self.width_cm * self.height_cm) / 1_000_000.0
    }
}

impl ValueObject for Dimensions {}

/// Declared package category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PackageCategory {
    Document,
    Electronics,
    Clothing,
    Food,
    #[default]
    Other,
}

/// Package descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PackageInfo {
    pub weight_kg: f64,
    pub dimensions: Dimensions,
    /// Declared value in the smallest currency unit.
    pub declared_value: u64,
    pub category: PackageCategory,
    pub fragile: bool,
    pub signature_required: bool,
}

impl PackageInfo {
    pub fn validate(&self) -> DomainResult<()> {
        if self.weight_kg <= 0.0 {
            return Err(DomainError::validation("package weight must be positive"));
        }
        if self.dimensions.length_cm <= 0.0
            || self.dimensions.width_cm <= 0.0
            || self.dimensions.height_cm <= 0.0
        {
            return Err(DomainError::validation(
                "package dimensions must be positive",
            ));
        }
        Ok(())
    }

    pub fn volume_m3(&self) -> f64 {
        self.dimensions.volume_m3()
    }
}

impl ValueObject for PackageInfo {}

/// Service tier booked for a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    #[default]
    Standard,
    Express,
    NextDay,
}

impl ServiceType {
    /// Transit budget used to derive the estimated delivery timestamp.
    pub fn transit_days(&self) -> i64 {
        match self {
            ServiceType::Standard => 5,
            ServiceType::Express => 3,
            ServiceType::NextDay => 2,
        }
    }

    pub fn estimated_delivery(&self, booked_at: DateTime<Utc>) -> DateTime<Utc> {
        booked_at + Duration::days(self.transit_days())
    }
}

/// Handling priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    High,
    Urgent,
}

/// Insurance terms attached to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InsuranceTerms {
    pub insured: bool,
    /// Coverage amount in the smallest currency unit.
    pub coverage: u64,
}

/// Service descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service_type: ServiceType,
    pub priority: Priority,
    /// Shipping cost in the smallest currency unit.
    pub cost: u64,
    pub estimated_delivery: DateTime<Utc>,
    pub insurance: InsuranceTerms,
}

impl ServiceInfo {
    /// Service block with the estimated delivery derived from the booking time.
    pub fn quoted(
        service_type: ServiceType,
        priority: Priority,
        cost: u64,
        insurance: InsuranceTerms,
        booked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            service_type,
            priority,
            cost,
            estimated_delivery: service_type.estimated_delivery(booked_at),
            insurance,
        }
    }
}

impl Default for ServiceInfo {
    fn default() -> Self {
        // Placeholder until `ShipmentCreated` is applied; never observable on
        // a created shipment.
        Self {
            service_type: ServiceType::Standard,
            priority: Priority::Normal,
            cost: 0,
            estimated_delivery: DateTime::<Utc>::UNIX_EPOCH,
            insurance: InsuranceTerms::default(),
        }
    }
}

impl ValueObject for ServiceInfo {}

/// Payment state for a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
}

/// Payment method for a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    Upi,
    NetBanking,
    CashOnDelivery,
}

/// Payment descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PaymentInfo {
    pub status: PaymentStatus,
    pub method: PaymentMethod,
}

impl ValueObject for PaymentInfo {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_is_reported_in_cubic_meters() {
        let dims = Dimensions {
            length_cm: 100.0,
            width_cm: 50.0,
            height_cm: 20.0,
        };
        assert!((dims.volume_m3() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn next_day_service_estimates_two_days_out() {
        let booked_at = Utc::now();
        let service = ServiceInfo::quoted(
            ServiceType::NextDay,
            Priority::High,
            45_000,
            InsuranceTerms::default(),
            booked_at,
        );
        assert_eq!(service.estimated_delivery, booked_at + Duration::days(2));
    }

    #[test]
    fn zero_weight_package_is_rejected() {
        let package = PackageInfo {
            weight_kg: 0.0,
            dimensions: Dimensions {
                length_cm: 10.0,
                width_cm: 10.0,
                height_cm: 10.0,
            },
            ..Default::default()
        };
        assert!(package.validate().is_err());
    }

    #[test]
    fn flat_dimension_is_rejected() {
        let package = PackageInfo {
            weight_kg: 1.0,
            dimensions: Dimensions {
                length_cm: 10.0,
                width_cm: 0.0,
                height_cm: 10.0,
            },
            ..Default::default()
        };
        assert!(package.validate().is_err());
    }
}
