//! API request/response models, one module per resource.

pub mod auth;
pub mod doctors;
pub mod insurers;
pub mod orders;
pub mod pagination;
pub mod patients;
pub mod persons;
pub mod specialties;
pub mod users;

use crate::errors::{Error, Result, ValidationReason};

/// Reject blank required string fields with a `missing_field` reason.
pub(crate) fn require(value: &str, field: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation {
            reason: ValidationReason::MissingField,
            message: format!("{field} is required"),
        });
    }
    Ok(())
}

/// Reject negative quantities/durations with a `negative_quantity` reason.
pub(crate) fn require_non_negative(value: i32, field: &'static str) -> Result<()> {
    if value < 0 {
        return Err(Error::Validation {
            reason: ValidationReason::NegativeQuantity,
            message: format!("{field} must not be negative"),
        });
    }
    Ok(())
}
