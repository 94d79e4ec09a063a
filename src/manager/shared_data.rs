//! Publishes immutable status snapshots for consumers on other threads

use super::{Manager, ManagerContext};
use crate::context::ContextStatus;
use crate::error::ManagerError;
use chrono::{DateTime, Local};
use tokio::sync::watch;
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub struct SharedData {
    pub status: ContextStatus,
    pub steam_running: bool,
    pub published_at: DateTime<Local>,
}

impl Default for SharedData {
    fn default() -> Self {
        Self {
            status: ContextStatus::default(),
            steam_running: false,
            published_at: Local::now(),
        }
    }
}

pub struct SharedDataPublisher {
    sender: watch::Sender<SharedData>,
}

impl SharedDataPublisher {
    pub fn new() -> (Self, watch::Receiver<SharedData>) {
        let (sender, receiver) = watch::channel(SharedData::default());
        (Self { sender }, receiver)
    }

    pub fn subscribe(&self) -> watch::Receiver<SharedData> {
        self.sender.subscribe()
    }
}

impl Manager for SharedDataPublisher {
    fn name(&self) -> &str {
        "SharedDataPublisher"
    }

    fn tick(&mut self, ctx: &mut ManagerContext<'_>) -> Result<(), ManagerError> {
        let status = ctx.status();
        let steam_running = ctx.state.steam_running;
        // Only wakes receivers when something they can see changed
        let published = self.sender.send_if_modified(|shared| {
            if shared.status == *status && shared.steam_running == steam_running {
                return false;
            }
            shared.status = status.clone();
            shared.steam_running = steam_running;
            shared.published_at = Local::now();
            true
        });
        if published {
            trace!("Published status snapshot");
        }
        Ok(())
    }
}
