//! The orchestrator: devices, profiles and managers driven one cycle at a time
//!
//! One call to [`Context::tick`] is one cycle:
//!
//! 1. apply requests queued since the last cycle (profile switches happen here)
//! 2. refresh the primary, secondary and virtual pads
//! 3. count the cycle for `updates_per_sec`
//! 4. tick every manager
//! 5. run the active profile, or unplug the virtual pad when disabled
//! 6. zero the feedback bytes consumed this cycle
//!
//! Nothing in a cycle can fail the cycle. Profile runs and manager ticks are
//! isolated individually; errors and panics are logged and the loop goes on.
//! The context is owned by a single thread and is never ticked concurrently.

use crate::device::{DeviceRole, Devices};
use crate::error::ProfileError;
use crate::manager::{ContextRequest, ContextState, Manager, ManagerContext};
use crate::profile::user::{self, fallback_name};
use crate::profile::{builtin_profiles, Profile, ProfileInfo, RunContext};
use crate::settings::{AppSettings, SettingsStore};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

const EVENT_CAPACITY: usize = 32;
const DEVICE_ROLES: [DeviceRole; 3] = [DeviceRole::Primary, DeviceRole::Secondary, DeviceRole::Virtual];

/// Notifications for observers of the context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileEvent {
    Changed {
        previous: Option<String>,
        current: String,
    },
    ErrorsChanged {
        profile: String,
        errors: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Used when no default profile is stored in the settings
    pub default_profile: String,
    /// Device refreshes slower than this are reported
    pub device_budget: Duration,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            default_profile: "Desktop".to_string(),
            device_budget: Duration::from_millis(20),
        }
    }
}

/// Display-only snapshot of the context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStatus {
    pub started: bool,
    pub request_enable: bool,
    pub enabled: bool,
    pub current_profile: Option<String>,
    pub current_is_desktop: bool,
    pub updates_per_sec: u32,
    pub primary_valid: bool,
    pub secondary_valid: bool,
    pub virtual_valid: bool,
    pub keyboard_mouse_valid: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct DeviceHealth {
    valid: bool,
    failing: bool,
}

pub struct Context {
    devices: Devices,
    settings: Arc<dyn SettingsStore>,
    options: ContextOptions,
    profiles: Vec<Profile>,
    current: Option<usize>,
    managers: Vec<Box<dyn Manager>>,
    state: ContextState,
    pending: VecDeque<ContextRequest>,
    events: broadcast::Sender<ProfileEvent>,

    started: bool,
    settle_until: Option<Instant>,
    request_enable: bool,
    enabled: bool,

    cycles: u32,
    window_start: Instant,
    updates_per_sec: u32,

    health: [DeviceHealth; 3],
    profile_failing: bool,
    failing_managers: Vec<bool>,
}

impl Context {
    pub fn new(devices: Devices, settings: Arc<dyn SettingsStore>, options: ContextOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            devices,
            settings,
            options,
            profiles: Vec::new(),
            current: None,
            managers: Vec::new(),
            state: ContextState::default(),
            pending: VecDeque::new(),
            events,
            started: false,
            settle_until: None,
            request_enable: true,
            enabled: false,
            cycles: 0,
            window_start: Instant::now(),
            updates_per_sec: 0,
            health: [DeviceHealth::default(); 3],
            profile_failing: false,
            failing_managers: Vec::new(),
        }
    }

    /// Registers the built-in profile catalogue
    pub fn register_builtin_profiles(&mut self) -> Result<(), ProfileError> {
        for profile in builtin_profiles(self.settings.as_ref()) {
            self.add_profile(profile)?;
        }
        Ok(())
    }

    /// Appends a profile. Only allowed while stopped, names must be unique.
    pub fn add_profile(&mut self, profile: Profile) -> Result<(), ProfileError> {
        if self.started {
            return Err(ProfileError::RegistrationClosed(profile.name().to_string()));
        }
        if self.find(profile.name()).is_some() {
            return Err(ProfileError::DuplicateName(profile.name().to_string()));
        }
        if !profile.errors().is_empty() {
            warn!(
                "Registering profile {} with errors: {}",
                profile.name(),
                profile.errors().join("; ")
            );
        }
        debug!("Registered profile {}", profile.name());
        self.profiles.push(profile);
        Ok(())
    }

    /// Loads and registers every user profile found in `dir`
    pub fn load_user_profiles(&mut self, dir: &Path) -> usize {
        let mut loaded = 0;
        for profile in user::load_dir(dir) {
            match self.add_profile(profile) {
                Ok(()) => loaded += 1,
                Err(e) => warn!("Skipping user profile: {}", e),
            }
        }
        loaded
    }

    /// Appends a manager. Managers are fixed once the context started.
    pub fn add_manager(&mut self, manager: Box<dyn Manager>) -> Result<(), ProfileError> {
        if self.started {
            return Err(ProfileError::RegistrationClosed(manager.name().to_string()));
        }
        debug!("Registered manager {}", manager.name());
        self.managers.push(manager);
        self.failing_managers.push(false);
        Ok(())
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.profiles.iter().position(|profile| profile.name() == name)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProfileEvent> {
        self.events.subscribe()
    }

    /// Sender side of the profile events, for subscribing from other owners
    pub fn event_sender(&self) -> broadcast::Sender<ProfileEvent> {
        self.events.clone()
    }

    fn notify(&self, event: ProfileEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn request_enable(&self) -> bool {
        self.request_enable
    }

    pub fn set_request_enable(&mut self, enable: bool) {
        if self.request_enable != enable {
            info!("Request enable: {}", enable);
        }
        self.request_enable = enable;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn updates_per_sec(&self) -> u32 {
        self.updates_per_sec
    }

    pub fn device_valid(&self, role: DeviceRole) -> bool {
        self.devices.get(role).valid()
    }

    pub fn keyboard_mouse_valid(&self) -> bool {
        self.devices.desktop.valid()
    }

    pub fn current_profile(&self) -> Option<&Profile> {
        self.current.map(|index| &self.profiles[index])
    }

    pub fn profiles(&self) -> Vec<ProfileInfo> {
        self.profiles.iter().map(Profile::info).collect()
    }

    pub fn state(&self) -> &ContextState {
        &self.state
    }

    pub fn status(&self) -> ContextStatus {
        let current = self.current_profile();
        ContextStatus {
            started: self.started,
            request_enable: self.request_enable,
            enabled: self.enabled,
            current_profile: current.map(|profile| profile.name().to_string()),
            current_is_desktop: current.map(Profile::is_desktop).unwrap_or(false),
            updates_per_sec: self.updates_per_sec,
            primary_valid: self.device_valid(DeviceRole::Primary),
            secondary_valid: self.device_valid(DeviceRole::Secondary),
            virtual_valid: self.device_valid(DeviceRole::Virtual),
            keyboard_mouse_valid: self.keyboard_mouse_valid(),
        }
    }

    /// Queues a request for the start of the next cycle
    pub fn request(&mut self, request: ContextRequest) {
        self.pending.push_back(request);
    }

    /// Switches the active profile.
    ///
    /// Only visible, selectable profiles are eligible unless `is_default` is
    /// set, which also allows hidden ones. Profiles with errors never are.
    /// Selecting the active profile again succeeds without side effects.
    pub fn select_profile(&mut self, name: &str, is_default: bool) -> bool {
        let Some(index) = self
            .profiles
            .iter()
            .position(|profile| profile.name() == name && profile.is_eligible(is_default))
        else {
            debug!("Profile {} is not selectable", name);
            return false;
        };

        if self.current == Some(index) {
            return true;
        }

        if let Some(old) = self.current {
            self.release_held_input(old);
        }
        let settings = self.settings.as_ref();
        let previous = self.current.map(|old| {
            let outgoing = &mut self.profiles[old];
            outgoing.reset(settings);
            outgoing.name().to_string()
        });

        self.current = Some(index);
        let incoming = &mut self.profiles[index];
        incoming.reset(settings);
        let current = incoming.name().to_string();

        info!(
            "Profile changed: {} -> {}",
            previous.as_deref().unwrap_or("<none>"),
            current
        );
        self.profile_failing = false;
        self.notify(ProfileEvent::Changed { previous, current });
        true
    }

    /// Selects the configured default, or the first visible profile
    pub fn back_to_default(&mut self) -> bool {
        let default = AppSettings.default_profile(self.settings.as_ref(), &self.options.default_profile);
        if self.select_profile(&default, true) {
            return true;
        }

        warn!("Default profile {} unavailable, using first visible profile", default);
        let fallback = self
            .profiles
            .iter()
            .find(|profile| profile.visible() && profile.is_eligible(true))
            .map(|profile| profile.name().to_string());
        match fallback {
            Some(name) => self.select_profile(&name, true),
            None => {
                error!("No selectable profile available");
                false
            }
        }
    }

    /// Re-reads settings into every profile
    pub fn update_profiles(&mut self) {
        let settings = self.settings.as_ref();
        for profile in &mut self.profiles {
            profile.update(settings);
        }
        debug!("Profiles refreshed from settings");
    }

    /// Re-validates a user profile from its description.
    ///
    /// On success the new stages replace the old ones. On failure the errors
    /// are recorded and the previous stages stay in place, so an active
    /// profile keeps running.
    pub fn reload_user_profile(&mut self, fallback: &str, source: &str) -> Result<(), ProfileError> {
        let compiled = user::compile(source);
        let name = match &compiled {
            Ok(compiled) => compiled.name.clone(),
            Err(rejected) => rejected.name.clone().unwrap_or_else(|| fallback.to_string()),
        };

        let Some(index) = self.find(&name) else {
            return match compiled {
                Ok(compiled) => self.add_profile(compiled.into_profile()),
                Err(rejected) => self.add_profile(rejected.into_profile(fallback)),
            };
        };
        if !self.profiles[index].is_user_defined() {
            return Err(ProfileError::DuplicateName(name));
        }

        let settings = self.settings.as_ref();
        let profile = &mut self.profiles[index];
        let result = match compiled {
            Ok(compiled) => {
                compiled.apply_to(profile);
                profile.reset(settings);
                info!("Reloaded user profile {}", name);
                Ok(())
            }
            Err(rejected) => {
                warn!(
                    "User profile {} failed validation, keeping previous version: {}",
                    name,
                    rejected.errors.join("; ")
                );
                let reason = rejected.errors.join("; ");
                profile.set_errors(rejected.errors);
                Err(ProfileError::InvalidDescription(reason))
            }
        };

        let errors = self.profiles[index].errors().to_vec();
        self.notify(ProfileEvent::ErrorsChanged {
            profile: name,
            errors,
        });
        result
    }

    /// Re-reads every description in `dir` into the matching user profiles
    pub fn reload_user_profiles(&mut self, dir: &Path) {
        for path in user::profile_files(dir) {
            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    continue;
                }
            };
            if let Err(e) = self.reload_user_profile(&fallback_name(&path), &source) {
                warn!("{}: {}", path.display(), e);
            }
        }
    }

    /// Starts managers and ticking. `delay` holds off device work so pads
    /// can re-enumerate after a resume. Does nothing when already started.
    pub fn start(&mut self, delay: Duration) {
        self.start_at(Instant::now(), delay);
    }

    pub fn start_at(&mut self, now: Instant, delay: Duration) {
        if self.started {
            debug!("Context already started");
            return;
        }

        for manager in &mut self.managers {
            let name = manager.name().to_string();
            match panic::catch_unwind(AssertUnwindSafe(|| manager.start())) {
                Ok(Ok(())) => debug!("Manager {} started", name),
                Ok(Err(e)) => error!("Manager {} failed to start: {}", name, e),
                Err(_) => error!("Manager {} panicked while starting", name),
            }
        }

        self.started = true;
        self.settle_until = (!delay.is_zero()).then(|| now + delay);
        self.cycles = 0;
        self.updates_per_sec = 0;
        self.window_start = now;
        info!("Context started, settle delay {:?}", delay);
    }

    /// Halts ticking, stops managers and quiesces devices. Safe to repeat.
    pub fn stop(&mut self) {
        if !self.started {
            debug!("Context already stopped");
            return;
        }
        self.started = false;
        self.settle_until = None;
        self.enabled = false;

        for manager in self.managers.iter_mut().rev() {
            let name = manager.name().to_string();
            if panic::catch_unwind(AssertUnwindSafe(|| manager.stop())).is_err() {
                error!("Manager {} panicked while stopping", name);
            }
        }

        if let Some(index) = self.current {
            self.release_held_input(index);
        }

        let devices = &mut self.devices;
        let released = panic::catch_unwind(AssertUnwindSafe(|| {
            devices.virtual_pad.set_connected(false);
            for role in DEVICE_ROLES {
                devices.get_mut(role).release();
            }
        }));
        if released.is_err() {
            error!("Device release panicked");
        }

        if let Some(index) = self.current {
            self.profiles[index].reset(self.settings.as_ref());
        }
        self.updates_per_sec = 0;
        info!("Context stopped");
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// One cycle at `now`
    pub fn tick_at(&mut self, now: Instant) {
        if !self.started {
            return;
        }
        if let Some(until) = self.settle_until {
            if now < until {
                return;
            }
            debug!("Settle delay elapsed");
            self.settle_until = None;
        }

        self.apply_pending();
        self.refresh_devices();
        self.count_cycle(now);
        self.tick_managers();
        self.run_profile();
        self.reset_feedback();
    }

    fn apply_pending(&mut self) {
        while let Some(request) = self.pending.pop_front() {
            trace!("Applying {:?}", request);
            match request {
                ContextRequest::SelectProfile {
                    name,
                    include_hidden,
                } => {
                    if !self.select_profile(&name, include_hidden) {
                        warn!("Requested profile {} could not be selected", name);
                    }
                }
                ContextRequest::BackToDefault => {
                    self.back_to_default();
                }
                ContextRequest::ReloadSettings => self.update_profiles(),
            }
        }
    }

    fn refresh_devices(&mut self) {
        let budget = self.options.device_budget;
        for (slot, role) in DEVICE_ROLES.into_iter().enumerate() {
            let device = self.devices.get_mut(role);
            let started = Instant::now();
            let result = device.refresh();
            let elapsed = started.elapsed();
            if elapsed > budget {
                warn!(
                    "{} device {} took {:?} to refresh (budget {:?})",
                    role,
                    device.name(),
                    elapsed,
                    budget
                );
            }

            let health = &mut self.health[slot];
            match result {
                Ok(()) => {
                    if health.failing {
                        info!("{} device {} recovered", role, device.name());
                    }
                    health.failing = false;
                }
                Err(e) => {
                    if !health.failing {
                        warn!("{} device {} failed to refresh: {}", role, device.name(), e);
                    }
                    health.failing = true;
                }
            }

            let valid = device.valid();
            if valid != health.valid {
                info!(
                    "{} device {} is now {}",
                    role,
                    device.name(),
                    if valid { "valid" } else { "invalid" }
                );
                health.valid = valid;
            }
        }
    }

    fn count_cycle(&mut self, now: Instant) {
        self.cycles += 1;
        if now.saturating_duration_since(self.window_start) >= Duration::from_secs(1) {
            self.updates_per_sec = self.cycles;
            self.cycles = 0;
            self.window_start = now;
        }
    }

    fn tick_managers(&mut self) {
        if self.managers.is_empty() {
            return;
        }
        let status = self.status();
        let mut requests = Vec::new();

        for (manager, failing) in self.managers.iter_mut().zip(self.failing_managers.iter_mut()) {
            let mut ctx = ManagerContext::new(&mut self.state, &status, &mut requests);
            let result = panic::catch_unwind(AssertUnwindSafe(|| manager.tick(&mut ctx)));
            match result {
                Ok(Ok(())) => {
                    if *failing {
                        info!("Manager {} recovered", manager.name());
                    }
                    *failing = false;
                }
                Ok(Err(e)) => {
                    if !*failing {
                        warn!("Manager {} tick failed: {}", manager.name(), e);
                    }
                    *failing = true;
                }
                Err(_) => {
                    error!("Manager {} panicked during tick", manager.name());
                    *failing = true;
                }
            }
        }

        self.pending.extend(requests);
    }

    fn run_profile(&mut self) {
        let index = match self.current {
            Some(index) if self.request_enable => index,
            current => {
                if self.enabled {
                    info!("Profile processing disabled");
                    if let Some(index) = current {
                        self.release_held_input(index);
                    }
                }
                self.enabled = false;
                self.devices.virtual_pad.set_connected(false);
                return;
            }
        };
        if !self.enabled {
            info!("Profile processing enabled");
        }
        self.enabled = true;

        let profile = &mut self.profiles[index];
        let mut ctx = RunContext::new(self.devices.split());
        let result = panic::catch_unwind(AssertUnwindSafe(|| profile.run(&mut ctx)));
        match result {
            Ok(Ok(status)) => {
                trace!("Profile {} finished with {:?}", profile.name(), status);
                self.profile_failing = false;
            }
            Ok(Err(e)) => {
                if !self.profile_failing {
                    warn!("Profile {} failed: {}", profile.name(), e);
                }
                self.profile_failing = true;
            }
            Err(_) => {
                error!("Profile {} panicked", profile.name());
                self.profile_failing = true;
            }
        }
    }

    /// Sends releases for keys and mouse buttons the profile still holds
    fn release_held_input(&mut self, index: usize) {
        let profile = &mut self.profiles[index];
        let desktop = self.devices.desktop.as_mut();
        match panic::catch_unwind(AssertUnwindSafe(|| profile.release(desktop))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Profile {} could not release held input: {}", profile.name(), e),
            Err(_) => error!("Profile {} panicked while releasing held input", profile.name()),
        }
    }

    fn reset_feedback(&mut self) {
        for role in DEVICE_ROLES {
            self.devices.get_mut(role).reset_feedback();
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.stop();
    }
}
