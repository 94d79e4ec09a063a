//! Key/value settings store and the typed settings groups built on top of it
//!
//! Every settings group owns one fixed section name and a closed set of
//! typed keys. The store itself is injected into the context; there is no
//! process-wide settings singleton.
//!
//! Writers are the UI and tooling. Each successful `set` publishes a
//! [`SettingsChange`] to every subscriber so the tick thread can pick the new
//! values up at a cycle boundary.

pub mod groups;
pub mod store;

pub use groups::{AppSettings, BackPanelMap, BackPanelSettings, HapticSettings};
pub use store::{MemorySettingsStore, TomlSettingsStore};

use crate::error::SettingsError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

/// Notification published after a value was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsChange {
    pub section: String,
    pub key: String,
}

/// Untyped access to sectioned settings
pub trait SettingsStore: Send + Sync {
    fn get_value(&self, section: &str, key: &str) -> Option<toml::Value>;

    fn set_value(&self, section: &str, key: &str, value: toml::Value) -> Result<(), SettingsError>;

    /// Registers a new receiver for change notifications
    fn subscribe(&self) -> mpsc::UnboundedReceiver<SettingsChange>;
}

/// Typed `get`/`set` on top of any [`SettingsStore`]
pub trait SettingsExt {
    /// Reads a value, falling back to `default` when it is missing or malformed
    fn get<T: DeserializeOwned>(&self, section: &str, key: &str, default: T) -> T;

    fn set<T: Serialize>(&self, section: &str, key: &str, value: T) -> Result<(), SettingsError>;
}

impl<S: SettingsStore + ?Sized> SettingsExt for S {
    fn get<T: DeserializeOwned>(&self, section: &str, key: &str, default: T) -> T {
        match self.get_value(section, key) {
            Some(value) => match value.try_into::<T>() {
                Ok(value) => value,
                Err(e) => {
                    warn!("Ignoring malformed setting {}.{}: {}", section, key, e);
                    default
                }
            },
            None => default,
        }
    }

    fn set<T: Serialize>(&self, section: &str, key: &str, value: T) -> Result<(), SettingsError> {
        let value = toml::Value::try_from(value).map_err(|e| SettingsError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.set_value(section, key, value)
    }
}
