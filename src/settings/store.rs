//! In-memory and TOML file backed settings stores

use super::{SettingsChange, SettingsStore};
use crate::error::SettingsError;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Section table plus change subscribers, shared by both stores
#[derive(Debug, Default)]
struct Sections {
    table: RwLock<toml::Table>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SettingsChange>>>,
}

impl Sections {
    fn from_table(table: toml::Table) -> Self {
        Self {
            table: RwLock::new(table),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn get(&self, section: &str, key: &str) -> Option<toml::Value> {
        self.table
            .read()
            .get(section)
            .and_then(|section| section.as_table())
            .and_then(|section| section.get(key))
            .cloned()
    }

    /// Applies the write to a copy of the table and commits it only once
    /// `persist` accepted the copy. The lock is held throughout so writes
    /// reach the backing file in the order they are committed.
    fn set(
        &self,
        section: &str,
        key: &str,
        value: toml::Value,
        persist: impl FnOnce(&toml::Table) -> Result<(), SettingsError>,
    ) -> Result<(), SettingsError> {
        let mut table = self.table.write();
        let mut staged = table.clone();
        let entry = staged
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        match entry {
            toml::Value::Table(section_table) => {
                section_table.insert(key.to_string(), value);
            }
            _ => {
                return Err(SettingsError::InvalidValue {
                    section: section.to_string(),
                    key: key.to_string(),
                    reason: "section is not a table".to_string(),
                })
            }
        }
        persist(&staged)?;
        *table = staged;
        Ok(())
    }

    fn notify(&self, section: &str, key: &str) {
        let change = SettingsChange {
            section: section.to_string(),
            key: key.to_string(),
        };
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(change.clone()).is_ok());
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SettingsChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }
}

/// Settings kept in memory only
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    sections: Sections,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_value(&self, section: &str, key: &str) -> Option<toml::Value> {
        self.sections.get(section, key)
    }

    fn set_value(&self, section: &str, key: &str, value: toml::Value) -> Result<(), SettingsError> {
        self.sections.set(section, key, value, |_| Ok(()))?;
        self.sections.notify(section, key);
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SettingsChange> {
        self.sections.subscribe()
    }
}

/// Settings persisted to a TOML file, one table per section.
///
/// Every write goes straight to disk.
#[derive(Debug)]
pub struct TomlSettingsStore {
    path: PathBuf,
    sections: Sections,
}

impl TomlSettingsStore {
    /// Opens the store, starting empty when the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let table = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let table: toml::Table = toml::from_str(&content)?;
            info!("Loaded {} settings sections from {}", table.len(), path.display());
            table
        } else {
            debug!("No settings file at {}, starting empty", path.display());
            toml::Table::new()
        };

        Ok(Self {
            path,
            sections: Sections::from_table(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, table: &toml::Table) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(table)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SettingsStore for TomlSettingsStore {
    fn get_value(&self, section: &str, key: &str) -> Option<toml::Value> {
        self.sections.get(section, key)
    }

    fn set_value(&self, section: &str, key: &str, value: toml::Value) -> Result<(), SettingsError> {
        if let Err(e) = self.sections.set(section, key, value, |table| self.persist(table)) {
            warn!("Failed to write settings to {}: {}", self.path.display(), e);
            return Err(e);
        }
        self.sections.notify(section, key);
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SettingsChange> {
        self.sections.subscribe()
    }
}
