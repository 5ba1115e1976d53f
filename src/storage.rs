//! JSON persistence for settings and run history.
//!
//! Loads fail closed: a missing, unreadable or corrupt file yields defaults
//! (with a tracing warning) rather than an error, so stale state can never
//! wedge the app. Writes go through a temp file in the target directory and
//! are renamed into place, so a reader sees the old file or the new one but
//! never a torn write.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::model::{HistoryEntry, RunReport, Settings};

/// History keeps this many entries, newest first.
pub const HISTORY_CAP: usize = 50;

const SETTINGS_FILE: &str = "settings.json";
const HISTORY_FILE: &str = "history.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no data directory available on this platform")]
    NoDataDir,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("could not encode {what}: {source}")]
    Encode {
        what: &'static str,
        source: serde_json::Error,
    },
}

/// Persistence seam for settings and history. The production store writes
/// JSON files under the user data directory; tests inject a temp directory.
pub trait Storage: Send + Sync {
    fn load_settings(&self) -> Settings;
    fn save_settings(&self, settings: &Settings) -> Result<(), StorageError>;
    fn load_history(&self) -> Vec<HistoryEntry>;
    fn append_history(&self, entry: HistoryEntry) -> Result<(), StorageError>;
}

pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Store rooted at the platform data directory, e.g.
    /// `~/.local/share/resume-tailor` on Linux.
    pub fn default_location() -> Result<Self, StorageError> {
        let dir = dirs::data_dir()
            .ok_or(StorageError::NoDataDir)?
            .join("resume-tailor");
        Ok(Self::new(dir))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!("could not read {}: {err}", path.display());
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("ignoring corrupt {}: {err}", path.display());
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, name: &str, what: &'static str, value: &T) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp, value)
            .map_err(|source| StorageError::Encode { what, source })?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.dir.join(name)).map_err(|err| StorageError::Io(err.error))?;
        Ok(())
    }
}

impl Storage for JsonFileStorage {
    fn load_settings(&self) -> Settings {
        self.read_json(SETTINGS_FILE).unwrap_or_default()
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        self.write_json(SETTINGS_FILE, "settings", settings)
    }

    fn load_history(&self) -> Vec<HistoryEntry> {
        self.read_json(HISTORY_FILE).unwrap_or_default()
    }

    fn append_history(&self, entry: HistoryEntry) -> Result<(), StorageError> {
        let mut entries = self.load_history();
        entries.insert(0, entry);
        entries.truncate(HISTORY_CAP);
        self.write_json(HISTORY_FILE, "history", &entries)
    }
}

/// Write a run report to an explicit path as pretty-printed JSON.
pub fn export_json(path: &Path, report: &RunReport) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|source| StorageError::Encode { what: "run report", source })?;
    fs::write(path, json)?;
    Ok(())
}
