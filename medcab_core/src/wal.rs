//! Dose journal.
//!
//! Every manual take and scheduled deduction leaves one JSON line in the
//! journal. Writers append only while holding the store's
//! [`DataLock`](crate::snapshot::DataLock), so journal order matches the order
//! in which quantities changed. All events of one store transaction go out in
//! a single write; a crash tears at most the last line, which readers skip.

use crate::{DoseEvent, DoseEventKind, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Append-only JSONL journal of dose events
#[derive(Clone, Debug)]
pub struct DoseJournal {
    path: PathBuf,
}

impl DoseJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the events of one store transaction
    ///
    /// An empty batch leaves the journal untouched (and uncreated).
    pub fn record(&self, events: &[DoseEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut batch = String::new();
        for event in events {
            batch.push_str(&serde_json::to_string(event)?);
            batch.push('\n');
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        if ends_mid_line(&mut file)? {
            batch.insert(0, '\n');
        }
        file.write_all(batch.as_bytes())?;
        file.sync_data()?;

        let scheduled = events
            .iter()
            .filter(|e| e.kind == DoseEventKind::Scheduled)
            .count();
        tracing::debug!(
            "Journaled {} dose events ({} scheduled, {} manual)",
            events.len(),
            scheduled,
            events.len() - scheduled
        );
        Ok(())
    }

    pub fn events(&self) -> Result<Vec<DoseEvent>> {
        read_journal(&self.path)
    }
}

fn ends_mid_line(file: &mut File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Read every parseable event from a journal file, oldest first
///
/// A missing journal reads as empty. Torn or corrupt lines are skipped.
pub fn read_journal(path: &Path) -> Result<Vec<DoseEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut events = Vec::new();
    let mut skipped = 0;
    for (index, line) in BufReader::new(File::open(path)?).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<DoseEvent>(&line) {
            Ok(event) => events.push(event),
            Err(e) => {
                skipped += 1;
                tracing::warn!("Skipping journal line {} of {:?}: {}", index + 1, path, e);
            }
        }
    }

    tracing::debug!("Read {} dose events from {:?} ({} skipped)", events.len(), path, skipped);
    Ok(events)
}
