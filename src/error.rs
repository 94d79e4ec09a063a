//! Error types for the engine subsystems
//!
//! Each subsystem owns one enum. None of these ever escape `Context::tick`;
//! the scheduler logs them and keeps running.

use thiserror::Error;

/// Errors raised by device adapters
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The adapter has no hardware behind it
    #[error("Device not connected: {0}")]
    NotConnected(String),

    /// Reading the next input snapshot failed
    #[error("Failed to read device input: {0}")]
    ReadError(String),

    /// Backend could not be initialized
    #[error("Failed to initialize device backend: {0}")]
    InitializationError(String),
}

/// Errors raised while running or building a profile
#[derive(Debug, Error)]
pub enum ProfileError {
    /// A stage failed while processing one cycle
    #[error("Stage failed in profile {profile}: {reason}")]
    StageError { profile: String, reason: String },

    /// Description could not be parsed or validated
    #[error("Invalid profile description: {0}")]
    InvalidDescription(String),

    /// Profile file could not be read
    #[error("Failed to load profile from {path}: {reason}")]
    LoadError { path: String, reason: String },

    /// Another profile already uses this name
    #[error("Profile name already registered: {0}")]
    DuplicateName(String),

    /// Profiles can only be appended while the context is stopped
    #[error("Cannot register profile {0} while the engine is running")]
    RegistrationClosed(String),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

/// Errors raised by background managers
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Start-up of the manager failed
    #[error("Failed to start manager {manager}: {reason}")]
    StartError { manager: String, reason: String },

    /// Background worker went away
    #[error("Worker of manager {0} disconnected")]
    WorkerDisconnected(String),
}

/// Errors raised by the settings store
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A stored value does not match the requested type
    #[error("Invalid value for {section}.{key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        reason: String,
    },
}

/// Errors raised while loading the application configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}

/// Errors raised by the engine driver and its handle
#[derive(Debug, Error)]
pub enum EngineError {
    /// The command channel to the tick loop is closed
    #[error("Engine command channel closed")]
    ChannelClosed,

    /// The requested profile could not be selected
    #[error("Profile not selectable: {0}")]
    ProfileNotSelectable(String),
}
