//! Application configuration loaded from `config.toml`
//!
//! Missing files and missing keys fall back to defaults so the engine always
//! starts. Per-profile settings live in the settings store, not here.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const APP_DIR: &str = "padbridge";
const CONFIG_FILE: &str = "config.toml";
const SETTINGS_FILE: &str = "settings.toml";
const PROFILES_DIR: &str = "profiles";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub processes: ProcessConfig,
    pub switcher: SwitcherConfig,
    pub profiles: ProfilesConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_interval_ms: u64,
    /// Settle delay applied when starting after a resume
    pub resume_delay_ms: u64,
    /// Refresh latency above which a device is reported as slow
    pub device_budget_ms: u64,
    pub default_profile: String,
    pub stick_deadzone: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5,
            resume_delay_ms: 1000,
            device_budget_ms: 20,
            default_profile: "Desktop".to_string(),
            stick_deadzone: 0.05,
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }

    pub fn device_budget(&self) -> Duration {
        Duration::from_millis(self.device_budget_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ProcessConfig {
    pub scan_interval_ms: u64,
    /// Executable names that identify a running Steam client
    pub steam_processes: Vec<String>,
    /// Whether Steam Input is configured to handle the pad while Steam runs
    pub steam_input: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 2000,
            steam_processes: vec![
                "steam".to_string(),
                "steam.exe".to_string(),
                "steamwebhelper".to_string(),
            ],
            steam_input: false,
        }
    }
}

impl ProcessConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(100))
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SwitcherConfig {
    /// Process name to profile name, matched case-insensitively
    pub applications: BTreeMap<String, String>,
    /// Keep back-panel shortcuts active while Steam Input owns the pad
    pub steam_shortcuts: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ProfilesConfig {
    /// Directory scanned for `*.toml` user profiles. Defaults next to the config file.
    pub directory: Option<PathBuf>,
    /// Settings store file. Defaults next to the config file.
    pub settings_file: Option<PathBuf>,
}

impl AppConfig {
    /// Default location: `<config dir>/padbridge/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push(APP_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Loads the config, writing defaults back when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: AppConfig = toml::from_str(&content)?;
            info!("Loaded configuration from {}", path.display());
            return Ok(config);
        }

        warn!("Config file {} does not exist, using defaults", path.display());
        let config = AppConfig::default();
        if let Err(e) = config.save(path) {
            warn!("Could not write default config: {}", e);
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Wrote configuration to {}", path.display());
        Ok(())
    }

    pub fn profile_dir(&self, config_path: &Path) -> PathBuf {
        self.profiles
            .directory
            .clone()
            .unwrap_or_else(|| Self::sibling(config_path, PROFILES_DIR))
    }

    pub fn settings_path(&self, config_path: &Path) -> PathBuf {
        self.profiles
            .settings_file
            .clone()
            .unwrap_or_else(|| Self::sibling(config_path, SETTINGS_FILE))
    }

    fn sibling(config_path: &Path, name: &str) -> PathBuf {
        config_path
            .parent()
            .map(|parent| parent.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("padbridge").join(CONFIG_FILE);

        let config = AppConfig::load(&path).expect("load");
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
        assert_eq!(config.engine.resume_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
[engine]
default_profile = "X360"

[switcher.applications]
"game.exe" = "DS4"
"#,
        )
        .expect("write");

        let config = AppConfig::load(&path).expect("load");
        assert_eq!(config.engine.default_profile, "X360");
        assert_eq!(config.engine.tick_interval_ms, 5);
        assert_eq!(
            config.switcher.applications.get("game.exe").map(String::as_str),
            Some("DS4")
        );
        assert_eq!(config.processes.scan_interval_ms, 2000);
    }

    #[test]
    fn derived_paths_sit_next_to_config() {
        let config = AppConfig::default();
        let path = Path::new("/tmp/padbridge/config.toml");
        assert_eq!(config.profile_dir(path), PathBuf::from("/tmp/padbridge/profiles"));
        assert_eq!(
            config.settings_path(path),
            PathBuf::from("/tmp/padbridge/settings.toml")
        );
    }

    #[test]
    fn invalid_toml_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[engine\n").expect("write");
        assert!(AppConfig::load(&path).is_err());
    }
}
