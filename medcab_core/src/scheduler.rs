//! Scheduled dose deduction.
//!
//! At every slot of the daily grids (08, 12, 14, 16 and 20 local) each
//! scheduled item whose own grid contains that hour loses one unit. A window
//! is processed at most once per local day. Processed window keys are part of
//! the store snapshot, so a window is marked done in the same write that
//! lowers the quantities.

use crate::regimen::is_as_needed;
use crate::schedule::canonical_grid;
use crate::{DoseEvent, DoseEventKind, OrderItem, PharmacyStore, TableChange};
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Windows already processed, keyed `YYYY-MM-DD:HH` in local time
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SchedulerState {
    #[serde(default)]
    pub processed_windows: BTreeSet<String>,
}

/// Every local hour at which some frequency has a dose, ascending
pub fn tick_hours() -> Vec<u8> {
    let hours: BTreeSet<u8> = (1..=4u8)
        .flat_map(|f| canonical_grid(f).iter().map(|t| t.hour()))
        .collect();
    hours.into_iter().collect()
}

/// Whether `item` is deducted automatically at local `hour`
pub fn is_due_at(item: &OrderItem, hour: u8) -> bool {
    !is_as_needed(item.frequency_per_day, item.dosage_text.as_deref())
        && canonical_grid(item.frequency_per_day)
            .iter()
            .any(|t| t.hour() == hour)
}

/// Items of active orders with units left that are due at `hour`
pub fn due_items(store: &PharmacyStore, hour: u8) -> Vec<&OrderItem> {
    store
        .active_items()
        .filter(|i| i.qty > 0 && is_due_at(i, hour))
        .collect()
}

/// Deduct one unit from every item due at the current local window
///
/// Does nothing outside a tick hour or when the window was already processed
/// today. Returns one event per deducted item.
pub fn run_scheduled_decrement(
    store: &mut PharmacyStore,
    now: DateTime<Utc>,
    zone: &FixedOffset,
) -> Vec<DoseEvent> {
    let local = now.with_timezone(zone);
    let Ok(hour) = u8::try_from(local.hour()) else {
        return Vec::new();
    };

    if !tick_hours().contains(&hour) {
        tracing::debug!("Local hour {:02} is not a dose window", hour);
        return Vec::new();
    }

    let today = local.date_naive().to_string();
    let window_key = format!("{}:{:02}", today, hour);
    let processed = &mut store.scheduler.processed_windows;
    if !processed.insert(window_key.clone()) {
        tracing::info!("Window {} already processed", window_key);
        return Vec::new();
    }
    processed.retain(|k| k.starts_with(&today));

    let due: Vec<(Uuid, u32, String)> = due_items(store, hour)
        .into_iter()
        .map(|i| (i.id, i.qty.saturating_sub(1), i.medicine_name().to_owned()))
        .collect();

    let mut events = Vec::with_capacity(due.len());
    for (item_id, remaining, medicine_name) in due {
        store.commit(TableChange::OrderItemQtyChanged {
            item_id,
            qty: remaining,
        });
        events.push(DoseEvent {
            id: Uuid::new_v4(),
            order_item_id: item_id,
            medicine_name,
            kind: DoseEventKind::Scheduled,
            remaining,
            at: now,
        });
    }

    tracing::info!(
        "Scheduled deduction @ {} {:02}:00: {} items decremented",
        today,
        hour,
        events.len()
    );
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::seed_demo_store;
    use crate::schedule::default_zone;
    use chrono::{Duration, TimeZone};

    fn qty_of(store: &PharmacyStore, medicine_id: &str) -> u32 {
        store
            .order_items
            .iter()
            .find(|i| i.medicine.as_ref().is_some_and(|m| m.id == medicine_id))
            .unwrap()
            .qty
    }

    #[test]
    fn test_tick_hours() {
        assert_eq!(tick_hours(), vec![8, 12, 14, 16, 20]);
    }

    #[test]
    fn test_morning_window_deducts_scheduled_items() {
        let mut store = seed_demo_store(Utc::now());

        // 02:30 UTC is 08:00 local
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 2, 30, 0).unwrap();
        let events = run_scheduled_decrement(&mut store, now, &default_zone());

        // paracetamol (3/day) and cetirizine (1/day); ibuprofen is as-needed
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == DoseEventKind::Scheduled));
        assert_eq!(qty_of(&store, "paracetamol_500"), 14);
        assert_eq!(qty_of(&store, "cetirizine_10"), 9);
        assert_eq!(qty_of(&store, "ibuprofen_400"), 10);
        assert!(store.scheduler.processed_windows.contains("2024-05-01:08"));
    }

    #[test]
    fn test_window_processed_once_per_day() {
        let mut store = seed_demo_store(Utc::now());
        let zone = default_zone();

        let first = Utc.with_ymd_and_hms(2024, 5, 1, 8, 31, 0).unwrap(); // 14:01 local
        let second = first + Duration::minutes(20);

        assert_eq!(run_scheduled_decrement(&mut store, first, &zone).len(), 1);
        assert!(run_scheduled_decrement(&mut store, second, &zone).is_empty());
        assert_eq!(qty_of(&store, "paracetamol_500"), 14);
    }

    #[test]
    fn test_outside_window_does_nothing() {
        let mut store = seed_demo_store(Utc::now());

        // 05:00 UTC is 10:30 local
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 5, 0, 0).unwrap();
        assert!(run_scheduled_decrement(&mut store, now, &default_zone()).is_empty());
        assert!(store.scheduler.processed_windows.is_empty());
    }

    #[test]
    fn test_prunes_previous_days() {
        let mut store = seed_demo_store(Utc::now());
        store.scheduler.processed_windows.insert("2024-04-30:20".into());

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 30, 0).unwrap(); // 20:00 local
        run_scheduled_decrement(&mut store, now, &default_zone());

        assert_eq!(
            store.scheduler.processed_windows.iter().collect::<Vec<_>>(),
            vec!["2024-05-01:20"]
        );
    }

    #[test]
    fn test_empty_items_not_deducted() {
        let mut store = seed_demo_store(Utc::now());
        for item in store.order_items.iter_mut() {
            item.qty = 0;
        }

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 2, 30, 0).unwrap();
        assert!(run_scheduled_decrement(&mut store, now, &default_zone()).is_empty());
    }

    #[test]
    fn test_is_due_at_follows_grid() {
        let store = seed_demo_store(Utc::now());
        let cetirizine = store
            .order_items
            .iter()
            .find(|i| i.frequency_per_day == 1)
            .unwrap();
        assert!(is_due_at(cetirizine, 8));
        assert!(!is_due_at(cetirizine, 20));
    }

    #[test]
    fn test_racing_ticks_deduct_window_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("store.json");
        let journal = crate::wal::DoseJournal::new(temp_dir.path().join("dose_events.wal"));
        seed_demo_store(Utc::now()).save(&path).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 2, 30, 0).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                let journal = journal.clone();
                std::thread::spawn(move || {
                    PharmacyStore::record_doses(&path, &journal, |store| {
                        Ok(run_scheduled_decrement(store, now, &default_zone()))
                    })
                    .unwrap()
                    .len()
                })
            })
            .collect();
        let deducted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(deducted, 2);
        assert_eq!(journal.events().unwrap().len(), 2);
        let store = PharmacyStore::load(&path).unwrap();
        assert_eq!(qty_of(&store, "paracetamol_500"), 14);
    }
}
