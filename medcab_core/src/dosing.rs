//! Manual dose consumption and due-dose reporting.

use crate::regimen::is_as_needed;
use crate::schedule::{local_hour, next_dose_times_in, DoseTime};
use crate::{DoseEvent, DoseEventKind, Error, PharmacyStore, Result, TableChange};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Record that a patient took one unit of an order item
///
/// The item must belong to one of the patient's orders and still have units
/// left; the remaining quantity never drops below zero.
pub fn consume_dose(
    store: &mut PharmacyStore,
    patient_id: &str,
    order_item_id: Uuid,
    at: DateTime<Utc>,
) -> Result<DoseEvent> {
    let item = store
        .item(order_item_id)
        .ok_or_else(|| Error::NotFound(format!("order item {}", order_item_id)))?;

    let owner = store.order(item.order_id).map(|o| o.patient_id.as_str());
    if owner != Some(patient_id) {
        return Err(Error::Forbidden(format!(
            "order item {} does not belong to {}",
            order_item_id, patient_id
        )));
    }

    let medicine_name = item.medicine_name().to_owned();
    let remaining = item
        .qty
        .checked_sub(1)
        .ok_or_else(|| Error::NothingToConsume(medicine_name.clone()))?;

    store.commit(TableChange::OrderItemQtyChanged {
        item_id: order_item_id,
        qty: remaining,
    });

    tracing::info!(
        "{} took one {} ({} remaining)",
        patient_id,
        medicine_name,
        remaining
    );

    Ok(DoseEvent {
        id: Uuid::new_v4(),
        order_item_id,
        medicine_name,
        kind: DoseEventKind::Manual,
        remaining,
        at,
    })
}

/// A scheduled medicine the patient still holds
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DueDose {
    pub item_id: Uuid,
    pub medicine_name: String,
    pub qty: u32,
    pub frequency_per_day: u8,
    pub dosage_text: Option<String>,
    pub next_times: Vec<DoseTime>,
}

/// Scheduled medicines for a patient, with the local hour they were computed at
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DueDoses {
    pub local_hour: u32,
    pub items: Vec<DueDose>,
}

/// List a patient's scheduled items with units left and their next dose times
pub fn due_doses(
    store: &PharmacyStore,
    patient_id: &str,
    now: DateTime<Utc>,
    zone: &FixedOffset,
) -> DueDoses {
    let statuses = store.order_statuses();

    let items = store
        .patient_items(patient_id)
        .into_iter()
        .filter(|i| statuses.get(&i.order_id).is_some_and(|s| s.is_active()))
        .filter(|i| i.qty > 0)
        .filter(|i| !is_as_needed(i.frequency_per_day, i.dosage_text.as_deref()))
        .map(|i| DueDose {
            item_id: i.id,
            medicine_name: i.medicine_name().to_owned(),
            qty: i.qty,
            frequency_per_day: i.frequency_per_day,
            dosage_text: i.dosage_text.clone(),
            next_times: next_dose_times_in(i.frequency_per_day, Some(now), zone),
        })
        .collect();

    DueDoses {
        local_hour: local_hour(now, zone),
        items,
    }
}
