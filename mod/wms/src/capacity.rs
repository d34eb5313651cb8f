//! Capacity checker — decides accept/reject for a candidate inbound
//! quantity (and volume, where tracked) against a location's declared
//! ceilings. Pure; no storage access.

use wharf_core::ServiceError;

/// Declared ceilings of a storage location. 0 means unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CapacityLimits {
    pub max_quantity: i64,
    pub max_volume: f64,
}

/// Live committed usage at a location, summed across all products.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StockLevel {
    pub quantity: i64,
    pub volume: f64,
}

/// A rejected capacity check. The detail string is rendered verbatim in
/// the HTTP error body.
#[derive(Debug, Clone, PartialEq)]
pub enum CapacityError {
    Quantity {
        descriptor: String,
        max: i64,
        current: i64,
        requested: i64,
    },
    Volume {
        descriptor: String,
        max: f64,
        current: f64,
        requested: f64,
    },
}

impl CapacityError {
    pub fn details(&self) -> String {
        match self {
            CapacityError::Quantity {
                descriptor,
                max,
                current,
                requested,
            } => format!("{descriptor} capacity: {max}. Current: {current}. Cannot add {requested}."),
            CapacityError::Volume {
                descriptor,
                max,
                current,
                requested,
            } => format!(
                "{descriptor} max volume: {max}. Current: {current}. Cannot add {requested}."
            ),
        }
    }

    /// Convert into the service error returned to the client.
    /// `at_destination` selects the transfer-path wording.
    pub fn into_rejection(self, at_destination: bool) -> ServiceError {
        let details = self.details();
        let message = match (&self, at_destination) {
            (CapacityError::Quantity { .. }, false) => "Over-allocation prevented",
            (CapacityError::Quantity { .. }, true) => "Over-allocation prevented at destination",
            (CapacityError::Volume { .. }, false) => "Volume over-allocation prevented",
            (CapacityError::Volume { .. }, true) => {
                "Volume over-allocation prevented at destination"
            }
        };
        ServiceError::CapacityExceeded {
            message: message.to_string(),
            details,
        }
    }
}

/// Check whether `incoming_quantity` (and `incoming_volume`) fit at a
/// location currently holding `current`, under `limits`.
///
/// The candidate quantity is added on top of the live sum across all
/// products at the location — a single numeric slot capacity, not a
/// per-product one.
pub fn check_capacity(
    descriptor: &str,
    limits: &CapacityLimits,
    current: &StockLevel,
    incoming_quantity: i64,
    incoming_volume: f64,
) -> Result<(), CapacityError> {
    if limits.max_quantity > 0 && current.quantity + incoming_quantity > limits.max_quantity {
        return Err(CapacityError::Quantity {
            descriptor: descriptor.to_string(),
            max: limits.max_quantity,
            current: current.quantity,
            requested: incoming_quantity,
        });
    }

    if limits.max_volume > 0.0 && current.volume + incoming_volume > limits.max_volume {
        return Err(CapacityError::Volume {
            descriptor: descriptor.to_string(),
            max: limits.max_volume,
            current: current.volume,
            requested: incoming_volume,
        });
    }

    Ok(())
}
