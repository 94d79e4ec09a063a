//! Forwards settings writes to the context as one reload per cycle

use super::{ContextRequest, Manager, ManagerContext};
use crate::error::ManagerError;
use crate::settings::SettingsChange;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, warn};

pub struct SettingsSync {
    changes: mpsc::UnboundedReceiver<SettingsChange>,
    closed: bool,
}

impl SettingsSync {
    /// `changes` is usually obtained from `SettingsStore::subscribe`
    pub fn new(changes: mpsc::UnboundedReceiver<SettingsChange>) -> Self {
        Self {
            changes,
            closed: false,
        }
    }
}

impl Manager for SettingsSync {
    fn name(&self) -> &str {
        "SettingsSync"
    }

    fn tick(&mut self, ctx: &mut ManagerContext<'_>) -> Result<(), ManagerError> {
        if self.closed {
            return Ok(());
        }

        let mut changed = 0usize;
        loop {
            match self.changes.try_recv() {
                Ok(change) => {
                    debug!("Setting changed: {}.{}", change.section, change.key);
                    changed += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("Settings store went away, no further reloads");
                    self.closed = true;
                    break;
                }
            }
        }

        if changed > 0 {
            ctx.request(ContextRequest::ReloadSettings);
        }
        Ok(())
    }
}
