//! Controller profile engine
//!
//! Reads physical pads, runs the active profile once per cycle to drive a
//! virtual pad or desktop input, forwards rumble back to the hardware, and
//! switches profiles as running applications change.

pub mod config;
pub mod context;
pub mod device;
pub mod engine;
pub mod error;
pub mod haptic;
pub mod manager;
pub mod profile;
pub mod settings;

pub use context::{Context, ContextOptions, ContextStatus, ProfileEvent};
pub use engine::{DriverOptions, EngineHandle, EngineStatus, PowerEvent, TickDriver};
pub use profile::{Profile, Status};
