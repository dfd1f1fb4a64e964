//! API request/response models for medical orders and their lines.

use super::doctors::DoctorResponse;
use super::insurers::InsurerResponse;
use super::pagination::Pagination;
use super::patients::PatientResponse;
use super::{require, require_non_negative};
use crate::db::models::orders::{OrderDBResponse, OrderLineDBResponse};
use crate::errors::Result;
use crate::types::{DoctorId, InsurerId, OrderId, OrderLineId, PatientId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Lifecycle state of a medical order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Fulfilled,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderCreate {
    pub doctor_id: DoctorId,
    pub patient_id: PatientId,
    pub insurer_id: Option<InsurerId>,
    pub diagnosis: String,
    pub observations: Option<String>,
    /// Defaults to `open`
    pub status: Option<OrderStatus>,
    /// Lines created together with the order, in the same transaction
    #[serde(default)]
    pub lines: Vec<OrderLineCreate>,
}

impl OrderCreate {
    pub fn validate(&self) -> Result<()> {
        require(&self.diagnosis, "diagnosis")?;
        for line in &self.lines {
            line.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderReplace {
    pub id: OrderId,
    pub version: Version,
    pub doctor_id: DoctorId,
    pub patient_id: PatientId,
    pub insurer_id: Option<InsurerId>,
    pub diagnosis: String,
    pub observations: Option<String>,
    pub status: OrderStatus,
}

impl OrderReplace {
    pub fn validate(&self) -> Result<()> {
        require(&self.diagnosis, "diagnosis")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: OrderId,
    pub doctor_id: DoctorId,
    pub patient_id: PatientId,
    pub insurer_id: Option<InsurerId>,
    pub diagnosis: String,
    pub observations: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub version: Version,
    /// Included only when requested with `include=lines`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<OrderLineResponse>>,
    /// Included only when requested with `include=patient`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(no_recursion)]
    pub patient: Option<PatientResponse>,
    /// Included only when requested with `include=doctor`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(no_recursion)]
    pub doctor: Option<DoctorResponse>,
    /// Included only when requested with `include=insurer`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(no_recursion)]
    pub insurer: Option<InsurerResponse>,
}

impl From<OrderDBResponse> for OrderResponse {
    fn from(db: OrderDBResponse) -> Self {
        Self {
            id: db.id,
            doctor_id: db.doctor_id,
            patient_id: db.patient_id,
            insurer_id: db.insurer_id,
            diagnosis: db.diagnosis,
            observations: db.observations,
            status: db.status,
            created_at: db.created_at,
            version: db.version,
            lines: None,
            patient: None,
            doctor: None,
            insurer: None,
        }
    }
}

impl OrderResponse {
    pub fn with_lines(mut self, lines: Vec<OrderLineResponse>) -> Self {
        self.lines = Some(lines);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineCreate {
    pub medication: String,
    pub quantity: i32,
    pub dosage: Option<String>,
    pub frequency_hours: Option<i32>,
    pub single_application: Option<bool>,
    pub treatment_started: Option<bool>,
    pub duration_days: Option<i32>,
}

impl OrderLineCreate {
    pub fn validate(&self) -> Result<()> {
        require(&self.medication, "medication")?;
        require_non_negative(self.quantity, "quantity")?;
        if let Some(duration) = self.duration_days {
            require_non_negative(duration, "duration_days")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineReplace {
    pub id: OrderLineId,
    pub version: Version,
    pub medication: String,
    pub quantity: i32,
    pub dosage: Option<String>,
    pub frequency_hours: Option<i32>,
    pub single_application: bool,
    pub treatment_started: bool,
    pub duration_days: Option<i32>,
}

impl OrderLineReplace {
    pub fn validate(&self) -> Result<()> {
        require(&self.medication, "medication")?;
        require_non_negative(self.quantity, "quantity")?;
        if let Some(duration) = self.duration_days {
            require_non_negative(duration, "duration_days")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineResponse {
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

impl From<OrderLineDBResponse> for OrderLineResponse {
    fn from(db: OrderLineDBResponse) -> Self {
        Self {
            id: db.id,
            order_id: db.order_id,
            medication: db.medication,
            quantity: db.quantity,
            dosage: db.dosage,
            frequency_hours: db.frequency_hours,
            single_application: db.single_application,
            treatment_started: db.treatment_started,
            duration_days: db.duration_days,
            version: db.version,
        }
    }
}

/// Query parameters for listing orders
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListOrdersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Related data to embed (comma-separated: "lines", "patient", "doctor", "insurer")
    pub include: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GetOrderQuery {
    /// Related data to embed (comma-separated: "lines", "patient", "doctor", "insurer")
    pub include: Option<String>,
}
