//! CSV rollup for archiving dose events.
//!
//! This module moves journaled dose events into an append-only CSV history
//! without losing data if the process dies halfway. Callers hold the store's
//! data lock so no take or tick appends to a journal being archived.

use crate::{DoseEvent, Result};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    order_item_id: String,
    medicine_name: String,
    kind: String,
    remaining: u32,
    at: String,
}

impl From<&DoseEvent> for CsvRow {
    fn from(event: &DoseEvent) -> Self {
        CsvRow {
            id: event.id.to_string(),
            order_item_id: event.order_item_id.to_string(),
            medicine_name: event.medicine_name.clone(),
            kind: event.kind.to_string(),
            remaining: event.remaining,
            at: event.at.to_rfc3339(),
        }
    }
}

/// Roll up WAL events into CSV and archive the WAL
///
/// This function:
/// 1. Reads all events from the WAL
/// 2. Appends them to the CSV file (creates with headers if needed)
/// 3. Syncs the CSV to disk
/// 4. Renames the WAL to .processed
/// 5. Returns the number of events processed
///
/// The WAL is renamed rather than deleted so it can be recovered by hand.
pub fn wal_to_csv_and_archive(wal_path: &Path, csv_path: &Path) -> Result<usize> {
    let events = crate::wal::read_journal(wal_path)?;

    if events.is_empty() {
        tracing::info!("No dose events in WAL to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for event in &events {
        writer.serialize(CsvRow::from(event))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Wrote {} dose events to CSV", events.len());

    let processed_path = wal_path.with_extension("wal.processed");
    std::fs::rename(wal_path, &processed_path)?;

    tracing::info!("Archived WAL to {:?}", processed_path);

    Ok(events.len())
}

/// Remove all `.processed` WAL files in `dir`
pub fn cleanup_processed_wals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed WAL: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed WAL files", count);
    }

    Ok(count)
}
