//! Background managers ticked once per cycle, whatever profile is active
//!
//! - [`process`] - watches running processes on a worker thread
//! - [`settings_sync`] - turns settings writes into reload requests
//! - [`switcher`] - selects profiles automatically from process state
//! - [`shared_data`] - publishes status snapshots to other threads
//!
//! Managers never touch devices or profiles directly. They share
//! [`ContextState`] with each other and ask the context for changes through
//! [`ContextRequest`]s, which are applied at the start of the next cycle.

pub mod process;
pub mod settings_sync;
pub mod shared_data;
pub mod switcher;

pub use process::ProcessManager;
pub use settings_sync::SettingsSync;
pub use shared_data::{SharedData, SharedDataPublisher};
pub use switcher::ProfileSwitcher;

use crate::context::ContextStatus;
use crate::error::ManagerError;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Change a manager asks the context to make
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextRequest {
    SelectProfile { name: String, include_hidden: bool },
    BackToDefault,
    /// Re-read settings into every profile
    ReloadSettings,
}

/// State managers publish for each other
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextState {
    pub steam_running: bool,
    /// Steam runs and handles the pad through Steam Input
    pub steam_uses_steam_input: bool,
    /// Lowercase names of running processes
    pub processes: Arc<BTreeSet<String>>,
}

pub struct ManagerContext<'a> {
    pub state: &'a mut ContextState,
    status: &'a ContextStatus,
    requests: &'a mut Vec<ContextRequest>,
}

impl<'a> ManagerContext<'a> {
    pub fn new(
        state: &'a mut ContextState,
        status: &'a ContextStatus,
        requests: &'a mut Vec<ContextRequest>,
    ) -> Self {
        Self {
            state,
            status,
            requests,
        }
    }

    /// Context status as of the start of this cycle
    pub fn status(&self) -> &ContextStatus {
        self.status
    }

    pub fn request(&mut self, request: ContextRequest) {
        self.requests.push(request);
    }
}

pub trait Manager {
    fn name(&self) -> &str;

    fn start(&mut self) -> Result<(), ManagerError> {
        Ok(())
    }

    /// Must be safe to call when not started
    fn stop(&mut self) {}

    /// Must not block
    fn tick(&mut self, ctx: &mut ManagerContext<'_>) -> Result<(), ManagerError>;
}
