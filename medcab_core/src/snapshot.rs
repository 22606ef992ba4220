//! Whole-file JSON snapshots and the data directory lock.
//!
//! Snapshots are read under a shared lock and replaced atomically: the new
//! contents go to a temp file in the same directory, are synced, then renamed
//! over the old file. Readers never observe a half-written snapshot.
//!
//! Read-modify-write cycles additionally hold a [`DataLock`], an exclusive
//! lock on a sidecar `<file>.lock`. The snapshot itself cannot carry that
//! lock because every save replaces its inode.

use crate::{Error, Result};
use fs2::FileExt;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Read a snapshot's raw contents, or `None` when it does not exist yet
pub fn read_shared(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    Ok(Some(contents))
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it
pub fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Exclusive lock over a snapshot and everything written alongside it
///
/// Released when dropped.
#[derive(Debug)]
pub struct DataLock {
    file: File,
    path: PathBuf,
}

impl DataLock {
    /// Block until the lock for `snapshot` is held
    pub fn acquire(snapshot: &Path) -> Result<Self> {
        let path = lock_path(snapshot);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;

        tracing::debug!("Acquired {:?}", path);
        Ok(Self { file, path })
    }
}

impl Drop for DataLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release {:?}: {}", self.path, e);
        }
    }
}

fn lock_path(snapshot: &Path) -> PathBuf {
    let mut name = snapshot.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    snapshot.with_file_name(name)
}
