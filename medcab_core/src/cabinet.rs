//! Cabinet aggregation.
//!
//! A patient's cabinet is the set of medicines they currently hold, built
//! from the items of their fulfilled or approved orders. Items sharing a
//! medicine, frequency and dosage label collapse into one entry whose
//! quantity is the sum of the group.

use crate::regimen::{classify, Regimen};
use crate::schedule::{next_dose_times_in, DoseTime};
use crate::{MedicineRef, OrderItem, OrderStatus};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// One line of a patient's cabinet (derived, never persisted)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CabinetEntry {
    pub medicine: MedicineRef,
    pub frequency_per_day: u8,
    pub dosage_text: Option<String>,
    pub quantity: u32,
    /// Item to decrement when a dose from this entry is consumed
    pub latest_item_id: Uuid,
    pub regimen: Regimen,
}

impl CabinetEntry {
    pub fn next_dose_times(&self, now: Option<DateTime<Utc>>, zone: &FixedOffset) -> Vec<DoseTime> {
        match self.regimen {
            Regimen::AsNeeded => Vec::new(),
            Regimen::Scheduled => next_dose_times_in(self.frequency_per_day, now, zone),
        }
    }
}

type GroupKey = (String, u8, Option<String>);

/// Group active order items into cabinet entries
///
/// `order_statuses` maps order id to status; items of orders that are
/// missing from the map or not fulfilled/approved are ignored, as are items
/// without a medicine reference. Entries come out in first-seen order.
pub fn build_cabinet<'a, I>(items: I, order_statuses: &HashMap<Uuid, OrderStatus>) -> Vec<CabinetEntry>
where
    I: IntoIterator<Item = &'a OrderItem>,
{
    let mut entries: Vec<CabinetEntry> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();

    for item in items {
        let active = order_statuses
            .get(&item.order_id)
            .is_some_and(|status| status.is_active());
        if !active {
            continue;
        }

        let Some(medicine) = &item.medicine else {
            tracing::warn!("Order item {} has no medicine reference, skipping", item.id);
            continue;
        };

        let key = (
            medicine.id.clone(),
            item.frequency_per_day,
            item.dosage_text.clone(),
        );

        match index.get(&key) {
            Some(&pos) => {
                let entry = &mut entries[pos];
                entry.quantity = entry.quantity.saturating_add(item.qty);
                entry.latest_item_id = item.id;
            }
            None => {
                index.insert(key, entries.len());
                entries.push(CabinetEntry {
                    medicine: medicine.clone(),
                    frequency_per_day: item.frequency_per_day,
                    dosage_text: item.dosage_text.clone(),
                    quantity: item.qty,
                    latest_item_id: item.id,
                    regimen: classify(item.frequency_per_day, item.dosage_text.as_deref()),
                });
            }
        }
    }

    tracing::debug!("Built cabinet with {} entries", entries.len());
    entries
}

/// Sort entries by medicine name for display
pub fn sort_by_medicine_name(entries: &mut [CabinetEntry]) {
    entries.sort_by(|a, b| {
        a.medicine
            .name
            .to_lowercase()
            .cmp(&b.medicine.name.to_lowercase())
    });
}
