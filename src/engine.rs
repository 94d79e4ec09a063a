//! Tick driver and command handle
//!
//! The driver owns the [`Context`] and ticks it from a tokio interval. Other
//! tasks talk to it only through an [`EngineHandle`]: commands travel over an
//! mpsc channel and are applied between ticks, status comes back through a
//! `watch` channel and profile events through `broadcast`.
//!
//! ```text
//! EngineHandle ─[EngineCommand]→ TickDriver<Running> ─[EngineStatus]→ watchers
//!                                      │
//!                                      └─ Context::tick every interval
//! ```

use crate::context::{Context, ContextStatus, ProfileEvent};
use crate::error::EngineError;
use crate::profile::ProfileInfo;
use statum::{machine, state};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMMAND_CAPACITY: usize = 64;

/// System power transitions forwarded by the platform layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    Suspend,
    Resume,
}

#[derive(Debug)]
pub enum EngineCommand {
    SelectProfile {
        name: String,
        reply: oneshot::Sender<bool>,
    },
    BackToDefault,
    SetRequestEnable(bool),
    Start {
        delay: Duration,
    },
    Stop,
    Power(PowerEvent),
    /// Re-read user profile descriptions and settings
    RefreshProfiles,
}

/// Snapshot published after every tick that changed something visible
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStatus {
    pub context: ContextStatus,
    pub profiles: Vec<ProfileInfo>,
}

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub tick_interval: Duration,
    /// Settle delay applied when resuming from suspend
    pub resume_delay: Duration,
    /// Directory re-read on [`EngineCommand::RefreshProfiles`]
    pub profile_dir: Option<PathBuf>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(5),
            resume_delay: Duration::from_millis(1000),
            profile_dir: None,
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum DriverState {
    Idle,
    Running,
    Stopped,
}

#[machine]
pub struct TickDriver<S: DriverState> {
    context: Context,
    options: DriverOptions,
    commands: mpsc::Receiver<EngineCommand>,
    status: watch::Sender<EngineStatus>,
    cancel: CancellationToken,
}

impl<S: DriverState> TickDriver<S> {
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// `force` also republishes the profile list when the status is unchanged
    fn publish(&self, force: bool) {
        let context = self.context.status();
        self.status.send_if_modified(|status| {
            if !force && status.context == context {
                return false;
            }
            status.context = context;
            status.profiles = self.context.profiles();
            true
        });
    }
}

impl TickDriver<Idle> {
    pub fn create(context: Context, options: DriverOptions) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (status_tx, status_rx) = watch::channel(EngineStatus {
            context: context.status(),
            profiles: context.profiles(),
        });
        let cancel = CancellationToken::new();
        let handle = EngineHandle {
            commands: command_tx,
            status: status_rx,
            events: context.event_sender(),
            cancel: cancel.clone(),
        };

        debug!("Creating tick driver with interval {:?}", options.tick_interval);
        (
            Self::new(context, options, command_rx, status_tx, cancel),
            handle,
        )
    }

    /// Starts the context and selects the default profile if none is active
    pub fn start(mut self, delay: Duration) -> TickDriver<Running> {
        if self.context.current_profile().is_none() && !self.context.back_to_default() {
            warn!("Starting without an active profile");
        }
        self.context.start(delay);
        self.publish(true);
        info!("Tick driver running");
        self.transition()
    }
}

impl TickDriver<Running> {
    fn handle_command(&mut self, command: EngineCommand) {
        debug!("Engine command: {:?}", command);
        match command {
            EngineCommand::SelectProfile { name, reply } => {
                let selected = self.context.select_profile(&name, false);
                if reply.send(selected).is_err() {
                    debug!("Select reply for {} dropped", name);
                }
            }
            EngineCommand::BackToDefault => {
                self.context.back_to_default();
            }
            EngineCommand::SetRequestEnable(enable) => self.context.set_request_enable(enable),
            EngineCommand::Start { delay } => self.context.start(delay),
            EngineCommand::Stop => self.context.stop(),
            EngineCommand::Power(PowerEvent::Suspend) => {
                info!("System suspending, stopping context");
                self.context.stop();
            }
            EngineCommand::Power(PowerEvent::Resume) => {
                info!("System resumed, restarting context");
                self.context.start(self.options.resume_delay);
            }
            EngineCommand::RefreshProfiles => {
                if let Some(dir) = self.options.profile_dir.clone() {
                    self.context.reload_user_profiles(&dir);
                }
                self.context.update_profiles();
            }
        }
        self.publish(true);
    }

    /// Ticks until the handle cancels or every handle is dropped
    pub async fn run(mut self) -> TickDriver<Stopped> {
        let mut interval = tokio::time::interval(self.options.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("All engine handles dropped");
                        break;
                    }
                },

                _ = interval.tick() => {
                    self.context.tick();
                    self.publish(false);
                }
            }
        }

        self.context.stop();
        self.publish(true);
        self.transition()
    }
}

impl TickDriver<Stopped> {
    pub fn into_context(self) -> Context {
        self.context
    }
}

/// Cloneable control surface of a running driver
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    status: watch::Receiver<EngineStatus>,
    events: broadcast::Sender<ProfileEvent>,
    cancel: CancellationToken,
}

impl EngineHandle {
    async fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Manual selection. Hidden and errored profiles are refused.
    pub async fn select_profile(&self, name: &str) -> Result<(), EngineError> {
        let (reply, selected) = oneshot::channel();
        self.send(EngineCommand::SelectProfile {
            name: name.to_string(),
            reply,
        })
        .await?;
        match selected.await {
            Ok(true) => Ok(()),
            Ok(false) => Err(EngineError::ProfileNotSelectable(name.to_string())),
            Err(_) => Err(EngineError::ChannelClosed),
        }
    }

    pub async fn back_to_default(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::BackToDefault).await
    }

    pub async fn set_request_enable(&self, enable: bool) -> Result<(), EngineError> {
        self.send(EngineCommand::SetRequestEnable(enable)).await
    }

    pub async fn start(&self, delay: Duration) -> Result<(), EngineError> {
        self.send(EngineCommand::Start { delay }).await
    }

    pub async fn stop(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Stop).await
    }

    pub async fn power(&self, event: PowerEvent) -> Result<(), EngineError> {
        self.send(EngineCommand::Power(event)).await
    }

    pub async fn refresh_profiles(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::RefreshProfiles).await
    }

    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProfileEvent> {
        self.events.subscribe()
    }

    /// Ends the driver loop. The context is stopped on the way out.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextOptions;
    use crate::device::{Devices, RecordingDesktop, SyntheticPad, SyntheticPadHandle};
    use crate::settings::MemorySettingsStore;
    use std::sync::Arc;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn context() -> (Context, SyntheticPadHandle) {
        let (primary, primary_handle) = SyntheticPad::new("primary");
        let (secondary, _) = SyntheticPad::new("secondary");
        let (virtual_pad, _) = SyntheticPad::new("virtual");
        let (desktop, _) = RecordingDesktop::new();
        let devices = Devices::new(
            Box::new(primary),
            Box::new(secondary),
            Box::new(virtual_pad),
            Box::new(desktop),
        );
        let mut context = Context::new(
            devices,
            Arc::new(MemorySettingsStore::new()),
            ContextOptions::default(),
        );
        context.register_builtin_profiles().expect("builtin");
        (context, primary_handle)
    }

    fn options() -> DriverOptions {
        DriverOptions {
            tick_interval: Duration::from_millis(1),
            resume_delay: Duration::ZERO,
            profile_dir: None,
        }
    }

    #[tokio::test]
    async fn start_selects_default_profile() {
        let (context, _) = context();
        let (driver, handle) = TickDriver::create(context, options());
        let driver = driver.start(Duration::ZERO);

        let status = handle.status();
        assert!(status.context.started);
        assert_eq!(status.context.current_profile.as_deref(), Some("Desktop"));
        assert_eq!(status.profiles.len(), 5);

        handle.shutdown();
        let stopped = driver.run().await;
        assert!(!stopped.context().is_started());
    }

    #[tokio::test]
    async fn commands_apply_between_ticks() {
        let (context, primary) = context();
        let (driver, handle) = TickDriver::create(context, options());
        let driver = driver.start(Duration::ZERO);
        let mut events = handle.subscribe();

        let control = async {
            handle.select_profile("X360").await.expect("select");
            assert!(matches!(
                handle.select_profile("Steam").await,
                Err(EngineError::ProfileNotSelectable(_))
            ));

            let mut status = handle.watch_status();
            timeout(
                WAIT,
                status.wait_for(|status| status.context.current_profile.as_deref() == Some("X360")),
            )
            .await
            .expect("in time")
            .expect("driver alive");

            let ticks = primary.refresh_count();
            timeout(WAIT, async {
                while primary.refresh_count() == ticks {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .expect("driver keeps ticking");

            handle.shutdown();
        };

        let (stopped, ()) = tokio::join!(driver.run(), control);
        assert_eq!(
            stopped.context().current_profile().map(|profile| profile.name()),
            Some("X360")
        );
        assert_eq!(
            events.try_recv().expect("event"),
            ProfileEvent::Changed {
                previous: Some("Desktop".to_string()),
                current: "X360".to_string()
            }
        );
    }

    #[tokio::test]
    async fn suspend_and_resume_cycle_the_context() {
        let (context, _) = context();
        let (driver, handle) = TickDriver::create(context, options());
        let driver = driver.start(Duration::ZERO);

        let control = async {
            let mut status = handle.watch_status();
            handle.power(PowerEvent::Suspend).await.expect("send");
            timeout(WAIT, status.wait_for(|status| !status.context.started))
                .await
                .expect("in time")
                .expect("driver alive");

            handle.power(PowerEvent::Resume).await.expect("send");
            timeout(WAIT, status.wait_for(|status| status.context.started))
                .await
                .expect("in time")
                .expect("driver alive");
            handle.shutdown();
        };

        let (stopped, ()) = tokio::join!(driver.run(), control);
        assert_eq!(
            stopped.context().current_profile().map(|profile| profile.name()),
            Some("Desktop")
        );
    }

    #[tokio::test]
    async fn dropped_handles_end_the_loop() {
        let (context, _) = context();
        let (driver, handle) = TickDriver::create(context, options());
        let driver = driver.start(Duration::ZERO);
        drop(handle);

        let stopped = timeout(WAIT, driver.run()).await.expect("loop ends");
        assert!(!stopped.into_context().is_started());
    }
}
