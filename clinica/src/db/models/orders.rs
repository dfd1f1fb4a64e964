//! Database models for medical orders and their owned lines.

use crate::api::models::orders::{OrderCreate, OrderLineCreate, OrderLineReplace, OrderReplace, OrderStatus};
use crate::types::{DoctorId, InsurerId, OrderId, OrderLineId, PatientId, Version};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a medical order. Lines supplied here are
/// inserted in the same transaction as the order.
#[derive(Debug, Clone)]
pub struct OrderCreateDBRequest {
    pub doctor_id: DoctorId,
    pub patient_id: PatientId,
    pub insurer_id: Option<InsurerId>,
    pub diagnosis: String,
    pub observations: Option<String>,
    pub status: OrderStatus,
    pub lines: Vec<OrderLineCreateDBRequest>,
}

impl From<OrderCreate> for OrderCreateDBRequest {
    fn from(api: OrderCreate) -> Self {
        Self {
            doctor_id: api.doctor_id,
            patient_id: api.patient_id,
            insurer_id: api.insurer_id,
            diagnosis: api.diagnosis,
            observations: api.observations,
            status: api.status.unwrap_or(OrderStatus::Open),
            lines: api.lines.into_iter().map(OrderLineCreateDBRequest::from).collect(),
        }
    }
}

/// Database request for replacing a medical order (lines are managed through
/// their own sub-resource).
#[derive(Debug, Clone)]
pub struct OrderUpdateDBRequest {
    pub expected_version: Version,
    pub doctor_id: DoctorId,
    pub patient_id: PatientId,
    pub insurer_id: Option<InsurerId>,
    pub diagnosis: String,
    pub observations: Option<String>,
    pub status: OrderStatus,
}

impl From<OrderReplace> for OrderUpdateDBRequest {
    fn from(api: OrderReplace) -> Self {
        Self {
            expected_version: api.version,
            doctor_id: api.doctor_id,
            patient_id: api.patient_id,
            insurer_id: api.insurer_id,
            diagnosis: api.diagnosis,
            observations: api.observations,
            status: api.status,
        }
    }
}

/// Database row for a medical order
#[derive(Debug, Clone, FromRow)]
pub struct OrderDBResponse {
    pub id: OrderId,
    pub doctor_id: DoctorId,
    pub patient_id: PatientId,
    pub insurer_id: Option<InsurerId>,
    pub diagnosis: String,
    pub observations: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub version: Version,
}

#[derive(Debug, Clone)]
pub struct OrderLineCreateDBRequest {
    pub medication: String,
    pub quantity: i32,
    pub dosage: Option<String>,
    pub frequency_hours: Option<i32>,
    pub single_application: bool,
    pub treatment_started: bool,
    pub duration_days: Option<i32>,
}

impl From<OrderLineCreate> for OrderLineCreateDBRequest {
    fn from(api: OrderLineCreate) -> Self {
        Self {
            medication: api.medication,
            quantity: api.quantity,
            dosage: api.dosage,
            frequency_hours: api.frequency_hours,
            single_application: api.single_application.unwrap_or(false),
            treatment_started: api.treatment_started.unwrap_or(false),
            duration_days: api.duration_days,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderLineUpdateDBRequest {
    pub expected_version: Version,
    pub medication: String,
    pub quantity: i32,
    pub dosage: Option<String>,
    pub frequency_hours: Option<i32>,
    pub single_application: bool,
    pub treatment_started: bool,
    pub duration_days: Option<i32>,
}

impl From<OrderLineReplace> for OrderLineUpdateDBRequest {
    fn from(api: OrderLineReplace) -> Self {
        Self {
            expected_version: api.version,
            medication: api.medication,
            quantity: api.quantity,
            dosage: api.dosage,
            frequency_hours: api.frequency_hours,
            single_application: api.single_application,
            treatment_started: api.treatment_started,
            duration_days: api.duration_days,
        }
    }
}

/// Database row for an order line
#[derive(Debug, Clone, FromRow)]
pub struct OrderLineDBResponse {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub medication: String,
    pub quantity: i32,
    pub dosage: Option<String>,
    pub frequency_hours: Option<i32>,
    pub single_application: bool,
    pub treatment_started: bool,
    pub duration_days: Option<i32>,
    pub version: Version,
}
