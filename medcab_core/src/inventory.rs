//! Inventory queries and manual orders.

use crate::{
    Error, Medicine, Order, OrderItem, OrderStatus, PharmacyStore, Result, TableChange,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

/// Dosage recorded on items of manual orders
pub const MANUAL_DOSAGE_TEXT: &str = "As directed";
const MANUAL_FREQUENCY: u8 = 1;
const MANUAL_DAYS_SUPPLY: u32 = 30;

/// In-stock medicines whose name contains `search`, at most `limit`
pub fn available_medicines<'a>(
    store: &'a PharmacyStore,
    search: &str,
    limit: usize,
) -> Vec<&'a Medicine> {
    let needle = search.trim().to_lowercase();
    store
        .medicines
        .iter()
        .filter(|m| m.stock > 0)
        .filter(|m| needle.is_empty() || m.name.to_lowercase().contains(&needle))
        .take(limit)
        .collect()
}

/// Medicines at or below their reorder threshold
pub fn low_stock(store: &PharmacyStore, default_threshold: u32) -> Vec<&Medicine> {
    store
        .medicines
        .iter()
        .filter(|m| m.stock <= m.reorder_threshold.unwrap_or(default_threshold))
        .collect()
}

/// One requested line of a manual order, written `medicine_id[:qty]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderLine {
    pub medicine_id: String,
    pub qty: u32,
}

impl FromStr for OrderLine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (medicine_id, qty) = match s.split_once(':') {
            Some((id, qty)) => {
                let qty = qty
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| Error::Other(format!("Invalid quantity in {:?}: {}", s, e)))?;
                (id, qty)
            }
            None => (s, 1),
        };

        let medicine_id = medicine_id.trim();
        if medicine_id.is_empty() {
            return Err(Error::Other(format!("Missing medicine id in {:?}", s)));
        }

        Ok(OrderLine {
            medicine_id: medicine_id.to_owned(),
            qty,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderedLine {
    pub medicine_name: String,
    pub qty: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ManualOrderReceipt {
    pub order_id: Uuid,
    pub items_ordered: Vec<OrderedLine>,
    pub warnings: Vec<String>,
}

fn has_prescription_for(store: &PharmacyStore, patient_id: &str, medicine: &Medicine) -> bool {
    let name = medicine.name.to_lowercase();
    store.patient_prescriptions(patient_id).any(|r| {
        r.extracted_text
            .as_deref()
            .is_some_and(|text| text.to_lowercase().contains(&name))
    })
}

/// Place and immediately fulfil an order on behalf of a patient
///
/// Lines for unknown medicines, prescription-only medicines without a
/// matching prescription on file, or medicines short on stock are dropped
/// with a warning. Stock is reserved line by line, so repeated lines for one
/// medicine cannot together exceed what is on the shelf. If no line survives
/// the order is rejected.
pub fn place_manual_order(
    store: &mut PharmacyStore,
    patient_id: &str,
    lines: &[OrderLine],
    now: DateTime<Utc>,
) -> Result<ManualOrderReceipt> {
    let mut warnings = Vec::new();
    let mut accepted: Vec<(Medicine, u32)> = Vec::new();
    // stock left per medicine after the lines accepted so far, first-seen order
    let mut left: Vec<(String, u32)> = Vec::new();

    for line in lines {
        let qty = line.qty.max(1);

        let Some(medicine) = store.medicine(&line.medicine_id) else {
            warnings.push(format!("Medicine {} not found", line.medicine_id));
            continue;
        };

        if medicine.prescription_required && !has_prescription_for(store, patient_id, medicine) {
            warnings.push(format!(
                "{} requires a prescription. Please upload one first.",
                medicine.name
            ));
            continue;
        }

        let slot = match left.iter().position(|(id, _)| *id == medicine.id) {
            Some(index) => index,
            None => {
                left.push((medicine.id.clone(), medicine.stock));
                left.len() - 1
            }
        };
        let Some(remaining) = left[slot].1.checked_sub(qty) else {
            warnings.push(format!(
                "Not enough stock for {} (available: {})",
                medicine.name, left[slot].1
            ));
            continue;
        };

        left[slot].1 = remaining;
        accepted.push((medicine.clone(), qty));
    }

    if accepted.is_empty() {
        let reason = if warnings.is_empty() {
            "No valid items".to_owned()
        } else {
            warnings.join("; ")
        };
        tracing::warn!("Manual order for {} rejected: {}", patient_id, reason);
        return Err(Error::OrderRejected(reason));
    }

    let order_id = Uuid::new_v4();
    store.commit(TableChange::OrderInserted(Order {
        id: order_id,
        patient_id: patient_id.to_owned(),
        status: OrderStatus::Pending,
        channel: "cli".into(),
        created_at: now,
        finalized_at: None,
    }));

    for (medicine, qty) in &accepted {
        store.commit(TableChange::OrderItemInserted(OrderItem {
            id: Uuid::new_v4(),
            order_id,
            medicine: Some(medicine.to_ref()),
            qty: *qty,
            dosage_text: Some(MANUAL_DOSAGE_TEXT.into()),
            frequency_per_day: MANUAL_FREQUENCY,
            days_supply: Some(MANUAL_DAYS_SUPPLY),
            created_at: now,
        }));
    }

    for (medicine_id, stock) in left {
        if accepted.iter().any(|(m, _)| m.id == medicine_id) {
            store.commit(TableChange::MedicineStockChanged { medicine_id, stock });
        }
    }

    store.commit(TableChange::OrderStatusChanged {
        order_id,
        status: OrderStatus::Fulfilled,
        finalized_at: Some(now),
    });

    tracing::info!(
        "Manual order {} for {} fulfilled with {} lines",
        order_id,
        patient_id,
        accepted.len()
    );

    Ok(ManualOrderReceipt {
        order_id,
        items_ordered: accepted
            .into_iter()
            .map(|(medicine, qty)| OrderedLine {
                medicine_name: medicine.name,
                qty,
            })
            .collect(),
        warnings,
    })
}
