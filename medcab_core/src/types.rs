//! Core domain types for the Medcab system.
//!
//! This module defines the records the cabinet logic works over:
//! - Medicines and the lightweight references order items carry
//! - Patients and their prescription records
//! - Orders, order items and their lifecycle status
//! - Dose events emitted when units are taken or deducted

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Medicine Types
// ============================================================================

/// A medicine in the pharmacy inventory
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    pub id: String,
    pub name: String,
    pub strength: Option<String>,
    pub unit_type: Option<String>,
    pub stock: u32,
    /// Stock level at or below which the medicine counts as low
    pub reorder_threshold: Option<u32>,
    #[serde(default)]
    pub prescription_required: bool,
    pub price: Option<f64>,
    pub description: Option<String>,
}

impl Medicine {
    /// Reference suitable for embedding in an order item
    pub fn to_ref(&self) -> MedicineRef {
        MedicineRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// The medicine an order item points at
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MedicineRef {
    pub id: String,
    pub name: String,
}

// ============================================================================
// Patient Types
// ============================================================================

/// A registered patient
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Patient {
    pub id: String,
    pub name: String,
}

/// An uploaded prescription, reduced to its extracted text
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrescriptionRecord {
    pub id: Uuid,
    pub patient_id: String,
    pub extracted_text: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

// ============================================================================
// Order Types
// ============================================================================

/// Lifecycle status of an order
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    Fulfilled,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    /// Whether items of an order in this status sit in the patient's cabinet
    pub fn is_active(self) -> bool {
        matches!(self, OrderStatus::Fulfilled | OrderStatus::Approved)
    }
}

/// A patient order
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub patient_id: String,
    pub status: OrderStatus,
    pub channel: String,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

/// A single line of an order
///
/// Immutable once fulfilled, except for `qty` which drops as doses are
/// consumed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub medicine: Option<MedicineRef>,
    pub qty: u32,
    pub dosage_text: Option<String>,
    /// 0 means as-needed, 1-4 map to fixed daily grids
    #[serde(default)]
    pub frequency_per_day: u8,
    pub days_supply: Option<u32>,
    /// Creation instant of the owning order
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Display name of the medicine, or a placeholder for dangling references
    pub fn medicine_name(&self) -> &str {
        self.medicine
            .as_ref()
            .map(|m| m.name.as_str())
            .unwrap_or("unknown medicine")
    }
}

// ============================================================================
// Dose Event Types
// ============================================================================

/// How a dose left the cabinet
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseEventKind {
    /// Patient pressed "taken" for an as-needed medicine
    Manual,
    /// Deducted automatically at a dose window
    Scheduled,
}

impl std::fmt::Display for DoseEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DoseEventKind::Manual => write!(f, "manual"),
            DoseEventKind::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// A recorded decrement of an order item
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DoseEvent {
    pub id: Uuid,
    pub order_item_id: Uuid,
    pub medicine_name: String,
    pub kind: DoseEventKind,
    pub remaining: u32,
    pub at: DateTime<Utc>,
}
