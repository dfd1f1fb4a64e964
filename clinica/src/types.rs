//! Common type definitions.
//!
//! All entity identifiers are surrogate integers assigned by the database
//! (`SERIAL` columns), wrapped in type aliases for readability at call sites.

// Type aliases for IDs
pub type PersonId = i32;
pub type UserId = i32;
pub type SpecialtyId = i32;
pub type DoctorId = i32;
pub type PatientId = i32;
pub type InsurerId = i32;
pub type OrderId = i32;
pub type OrderLineId = i32;

/// The version token carried by every entity for optimistic concurrency.
pub type Version = i32;
