//! Dose history loading.
//!
//! Recent dose events are read from both the live journal and the archived CSV.

use crate::wal::read_journal;
use crate::{DoseEvent, DoseEventKind, Error, Result};
use chrono::{DateTime, Duration, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// CSV row format for reading archived events
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    order_item_id: String,
    medicine_name: String,
    kind: String,
    remaining: u32,
    at: String,
}

impl TryFrom<CsvRow> for DoseEvent {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let parse_uuid = |s: &str| {
            Uuid::parse_str(s).map_err(|e| Error::Other(format!("Invalid UUID {:?}: {}", s, e)))
        };

        let kind = match row.kind.as_str() {
            "manual" => DoseEventKind::Manual,
            "scheduled" => DoseEventKind::Scheduled,
            other => return Err(Error::Other(format!("Unknown dose kind: {}", other))),
        };

        let at = DateTime::parse_from_rfc3339(&row.at)
            .map_err(|e| Error::Other(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        Ok(DoseEvent {
            id: parse_uuid(&row.id)?,
            order_item_id: parse_uuid(&row.order_item_id)?,
            medicine_name: row.medicine_name,
            kind,
            remaining: row.remaining,
            at,
        })
    }
}

/// Load dose events from the last `days` days from both journal and CSV
///
/// Returns events sorted newest first, deduplicated by event id. A window too
/// large to represent is an error.
pub fn load_recent_events(wal_path: &Path, csv_path: &Path, days: i64) -> Result<Vec<DoseEvent>> {
    let cutoff = Duration::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| Error::Other(format!("History window of {} days is out of range", days)))?;
    let mut events = Vec::new();
    let mut seen_ids = HashSet::new();

    for event in read_journal(wal_path)? {
        if event.at >= cutoff && seen_ids.insert(event.id) {
            events.push(event);
        }
    }
    tracing::debug!("Loaded {} events from journal", events.len());

    if csv_path.exists() {
        let mut csv_count = 0;
        for event in load_events_from_csv(csv_path)? {
            if event.at >= cutoff && seen_ids.insert(event.id) {
                events.push(event);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} events from CSV", csv_count);
    }

    events.sort_by(|a, b| b.at.cmp(&a.at));

    tracing::info!("Loaded {} dose events from last {} days", events.len(), days);
    Ok(events)
}

fn load_events_from_csv(path: &Path) -> Result<Vec<DoseEvent>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut events = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match DoseEvent::try_from(row) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!("Failed to parse CSV row: {}", e),
            },
            Err(e) => tracing::warn!("Failed to deserialize CSV row: {}", e),
        }
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::DoseJournal;

    fn create_test_event(name: &str, days_ago: i64) -> DoseEvent {
        DoseEvent {
            id: Uuid::new_v4(),
            order_item_id: Uuid::new_v4(),
            medicine_name: name.into(),
            kind: DoseEventKind::Manual,
            remaining: 2,
            at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn test_load_recent_events_from_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("doses.wal");
        let csv_path = temp_dir.path().join("dose_history.csv");

        DoseJournal::new(&wal_path)
            .record(&[
                create_test_event("a", 1),
                create_test_event("b", 3),
                create_test_event("c", 10), // Too old
            ])
            .unwrap();

        let events = load_recent_events(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_archived_events_roundtrip_through_csv() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("doses.wal");
        let csv_path = temp_dir.path().join("dose_history.csv");

        let event = create_test_event("Ibuprofen", 1);
        DoseJournal::new(&wal_path).record(std::slice::from_ref(&event)).unwrap();
        crate::csv_rollup::wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();

        // Same event still sitting in a fresh WAL must not be counted twice
        DoseJournal::new(&wal_path).record(std::slice::from_ref(&event)).unwrap();

        let events = load_recent_events(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, event.id);
        assert_eq!(events[0].medicine_name, "Ibuprofen");
        assert_eq!(events[0].kind, DoseEventKind::Manual);
    }

    #[test]
    fn test_events_sorted_newest_first() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("doses.wal");
        let csv_path = temp_dir.path().join("dose_history.csv");

        let journal = DoseJournal::new(&wal_path);
        journal.record(&[create_test_event("old", 5)]).unwrap();
        journal.record(&[create_test_event("new", 1)]).unwrap();

        let events = load_recent_events(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(events[0].medicine_name, "new");
        assert_eq!(events[1].medicine_name, "old");
    }

    #[test]
    fn test_out_of_range_window_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("doses.wal");
        let csv_path = temp_dir.path().join("dose_history.csv");

        let result = load_recent_events(&wal_path, &csv_path, i64::MAX);
        assert!(matches!(result, Err(Error::Other(_))));
    }
}
