//! Refill prediction.
//!
//! An item runs out `days_supply` days after its order was finalized. For each
//! medicine only the latest run-out counts: a newer order replaces the supply
//! of an older one. Medicines whose latest run-out falls within the look-ahead
//! window become candidates for a proactive refill reminder.

use crate::{Error, MedicineRef, PharmacyStore, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RefillCandidate {
    pub medicine_id: String,
    pub medicine_name: String,
    pub runout_date: NaiveDate,
    pub days_left: i64,
    pub current_stock: Option<u32>,
}

fn days_after(start: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days).and_then(|d| start.checked_add_signed(d))
}

/// Medicines a patient will run out of within `days_ahead` days of `now`
///
/// Only finalized orders that are fulfilled or approved count. Results are
/// ordered by run-out date. A look-ahead too large to represent is an error.
pub fn refill_candidates(
    store: &PharmacyStore,
    patient_id: &str,
    now: DateTime<Utc>,
    days_ahead: i64,
    default_days_supply: u32,
) -> Result<Vec<RefillCandidate>> {
    let horizon = days_after(now, days_ahead).ok_or_else(|| {
        Error::Other(format!("Look-ahead of {} days is out of range", days_ahead))
    })?;

    // latest run-out per medicine name
    let mut latest: HashMap<&str, (DateTime<Utc>, &MedicineRef)> = HashMap::new();
    for order in store.patient_orders(patient_id) {
        if !order.status.is_active() {
            continue;
        }
        let Some(finalized_at) = order.finalized_at else {
            continue;
        };

        for item in store.order_items.iter().filter(|i| i.order_id == order.id) {
            let Some(medicine) = &item.medicine else {
                continue;
            };
            let days_supply = item.days_supply.unwrap_or(default_days_supply);
            let Some(runout) = days_after(finalized_at, i64::from(days_supply)) else {
                tracing::warn!(
                    "Skipping item {}: {} days supply is out of range",
                    item.id,
                    days_supply
                );
                continue;
            };

            latest
                .entry(medicine.name.as_str())
                .and_modify(|slot| {
                    if runout > slot.0 {
                        *slot = (runout, medicine);
                    }
                })
                .or_insert((runout, medicine));
        }
    }

    let mut candidates: Vec<RefillCandidate> = latest
        .into_values()
        .filter(|(runout, _)| now <= *runout && *runout <= horizon)
        .map(|(runout, medicine)| RefillCandidate {
            medicine_id: medicine.id.clone(),
            medicine_name: medicine.name.clone(),
            runout_date: runout.date_naive(),
            days_left: (runout - now).num_days(),
            current_stock: store.medicine(&medicine.id).map(|m| m.stock),
        })
        .collect();
    candidates.sort_by(|a, b| {
        (a.runout_date, &a.medicine_name).cmp(&(b.runout_date, &b.medicine_name))
    });

    tracing::debug!(
        "{} refill candidates for {} within {} days",
        candidates.len(),
        patient_id,
        days_ahead
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{seed_demo_store, DEMO_PATIENT_ID};
    use crate::{Order, OrderItem, OrderStatus, TableChange};
    use uuid::Uuid;

    #[test]
    fn test_demo_order_runs_out_within_week() {
        let now = Utc::now();
        let store = seed_demo_store(now);

        let candidates = refill_candidates(&store, DEMO_PATIENT_ID, now, 7, 30).unwrap();

        assert_eq!(candidates.len(), 3);
        let para = candidates
            .iter()
            .find(|c| c.medicine_name == "Paracetamol")
            .unwrap();
        assert_eq!(para.days_left, 5);
        assert_eq!(para.current_stock, Some(240));
    }

    #[test]
    fn test_short_horizon_excludes() {
        let now = Utc::now();
        let store = seed_demo_store(now);
        assert!(refill_candidates(&store, DEMO_PATIENT_ID, now, 3, 30).unwrap().is_empty());
    }

    #[test]
    fn test_already_run_out_excluded() {
        let now = Utc::now();
        let store = seed_demo_store(now - Duration::days(10));
        assert!(refill_candidates(&store, DEMO_PATIENT_ID, now, 7, 30).unwrap().is_empty());
    }

    #[test]
    fn test_inactive_orders_ignored() {
        let now = Utc::now();
        let mut store = seed_demo_store(now);
        let order_id = store.orders[0].id;
        store.apply(&TableChange::OrderStatusChanged {
            order_id,
            status: OrderStatus::Cancelled,
            finalized_at: None,
        });

        assert!(refill_candidates(&store, DEMO_PATIENT_ID, now, 7, 30).unwrap().is_empty());
    }

    #[test]
    fn test_missing_days_supply_uses_default() {
        let now = Utc::now();
        let mut store = seed_demo_store(now);
        for item in store.order_items.iter_mut() {
            item.days_supply = None;
        }

        // default 60 days pushes run-out past the horizon
        assert!(refill_candidates(&store, DEMO_PATIENT_ID, now, 7, 60).unwrap().is_empty());
        assert_eq!(refill_candidates(&store, DEMO_PATIENT_ID, now, 7, 30).unwrap().len(), 3);
    }

    /// Add a fulfilled paracetamol order finalized `days_ago` days before `now`
    fn add_paracetamol_order(store: &mut PharmacyStore, now: DateTime<Utc>, days_ago: i64) {
        let at = now - Duration::days(days_ago);
        let order_id = Uuid::new_v4();
        let medicine = store.medicine("paracetamol_500").map(|m| m.to_ref());
        store.apply(&TableChange::OrderInserted(Order {
            id: order_id,
            patient_id: DEMO_PATIENT_ID.into(),
            status: OrderStatus::Fulfilled,
            channel: "cli".into(),
            created_at: at,
            finalized_at: Some(at),
        }));
        store.apply(&TableChange::OrderItemInserted(OrderItem {
            id: Uuid::new_v4(),
            order_id,
            medicine,
            qty: 30,
            dosage_text: Some("After meals".into()),
            frequency_per_day: 1,
            days_supply: Some(30),
            created_at: at,
        }));
    }

    #[test]
    fn test_expired_order_does_not_hide_newer_one() {
        let now = Utc::now();
        let mut store = seed_demo_store(now - Duration::days(60));
        add_paracetamol_order(&mut store, now, 25);

        let candidates = refill_candidates(&store, DEMO_PATIENT_ID, now, 7, 30).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].medicine_name, "Paracetamol");
        assert_eq!(candidates[0].days_left, 5);
    }

    #[test]
    fn test_newer_supply_suppresses_reminder() {
        let now = Utc::now();
        let mut store = seed_demo_store(now);
        add_paracetamol_order(&mut store, now, 2);

        let candidates = refill_candidates(&store, DEMO_PATIENT_ID, now, 7, 30).unwrap();

        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.medicine_name != "Paracetamol"));
    }

    #[test]
    fn test_out_of_range_look_ahead_is_an_error() {
        let now = Utc::now();
        let store = seed_demo_store(now);

        let result = refill_candidates(&store, DEMO_PATIENT_ID, now, i64::MAX, 30);
        assert!(matches!(result, Err(crate::Error::Other(_))));
    }

    #[test]
    fn test_huge_days_supply_skipped() {
        crate::logging::init_test();
        let now = Utc::now();
        let mut store = seed_demo_store(now);
        store.order_items[0].days_supply = Some(u32::MAX);

        let candidates = refill_candidates(&store, DEMO_PATIENT_ID, now, 7, 30).unwrap();
        assert_eq!(candidates.len(), 2);
    }
}
