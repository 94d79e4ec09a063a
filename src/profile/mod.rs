//! Profiles: named remap units executed once per cycle while active
//!
//! A profile is an ordered pair of stages:
//!
//! ```text
//! RemapStage ──Continue──► HapticStage (optional) ──► Status
//!      │
//!      └──Done──► Status::Done (haptic stage skipped this cycle)
//! ```
//!
//! The remap stage decides device routing. The haptic stage only runs when
//! the remap stage did not terminate the chain.

pub mod builtin;
pub mod desktop;
pub mod gamepad;
pub mod haptics;
pub mod keys;
pub mod user;

pub use builtin::builtin_profiles;
pub use desktop::DesktopRemap;
pub use gamepad::{GamepadRemap, Passthrough};
pub use haptics::{DesktopHaptics, FeedbackHaptics};
pub use user::{RuleRemap, RuleTarget};

use crate::device::{DesktopOutput, DeviceSplit};
use crate::error::ProfileError;
use crate::settings::SettingsStore;

/// Outcome of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Continue,
    /// Stop processing the chain for this cycle
    Done,
}

/// Per-run view of the devices
pub struct RunContext<'a> {
    pub devices: DeviceSplit<'a>,
}

impl<'a> RunContext<'a> {
    pub fn new(devices: DeviceSplit<'a>) -> Self {
        Self { devices }
    }
}

/// One composable stage of a profile
pub trait Layer {
    fn run(&mut self, ctx: &mut RunContext<'_>) -> Result<Status, ProfileError>;

    /// Clears transient state and re-reads configuration
    fn reset(&mut self, _settings: &dyn SettingsStore) {}

    /// Re-reads configuration, keeping transient state
    fn update(&mut self, _settings: &dyn SettingsStore) {}

    /// Lets go of every key and mouse button the stage still holds down.
    /// Called before the profile is deactivated or the context stops.
    fn release(&mut self, _desktop: &mut dyn DesktopOutput) -> Result<(), ProfileError> {
        Ok(())
    }
}

/// Mandatory first stage of every profile
pub enum RemapStage {
    Desktop(DesktopRemap),
    Gamepad(GamepadRemap),
    Passthrough(Passthrough),
    Rules(RuleRemap),
    Custom(Box<dyn Layer>),
}

impl RemapStage {
    fn layer(&mut self) -> &mut dyn Layer {
        match self {
            RemapStage::Desktop(stage) => stage,
            RemapStage::Gamepad(stage) => stage,
            RemapStage::Passthrough(stage) => stage,
            RemapStage::Rules(stage) => stage,
            RemapStage::Custom(stage) => stage.as_mut(),
        }
    }
}

/// Optional second stage
pub enum HapticStage {
    Feedback(FeedbackHaptics),
    Desktop(DesktopHaptics),
}

impl HapticStage {
    fn layer(&mut self) -> &mut dyn Layer {
        match self {
            HapticStage::Feedback(stage) => stage,
            HapticStage::Desktop(stage) => stage,
        }
    }
}

/// Read-only description of a profile for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileInfo {
    pub name: String,
    pub visible: bool,
    pub selectable: bool,
    pub desktop: bool,
    pub errors: Vec<String>,
}

pub struct Profile {
    name: String,
    visible: bool,
    selectable: bool,
    desktop: bool,
    user_defined: bool,
    errors: Vec<String>,
    remap: RemapStage,
    haptic: Option<HapticStage>,
}

impl Profile {
    pub fn new(name: impl Into<String>, remap: RemapStage) -> Self {
        Self {
            name: name.into(),
            visible: true,
            selectable: true,
            desktop: false,
            user_defined: false,
            errors: Vec::new(),
            remap,
            haptic: None,
        }
    }

    pub fn with_haptic(mut self, haptic: HapticStage) -> Self {
        self.haptic = Some(haptic);
        self
    }

    /// Hidden profiles can only be selected as a default or by managers
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Listed, but only reachable as a default or through a manager request
    pub fn unselectable(mut self) -> Self {
        self.selectable = false;
        self
    }

    pub fn desktop(mut self) -> Self {
        self.desktop = true;
        self
    }

    /// Marks a profile loaded from a user description
    pub fn user_defined(mut self) -> Self {
        self.user_defined = true;
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn selectable(&self) -> bool {
        self.selectable
    }

    pub fn is_desktop(&self) -> bool {
        self.desktop
    }

    pub fn is_user_defined(&self) -> bool {
        self.user_defined
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn set_errors(&mut self, errors: Vec<String>) {
        self.errors = errors;
    }

    /// Whether the profile may be selected. Profiles with errors never are.
    pub fn is_eligible(&self, include_hidden: bool) -> bool {
        self.errors.is_empty() && (include_hidden || (self.visible && self.selectable))
    }

    pub fn info(&self) -> ProfileInfo {
        ProfileInfo {
            name: self.name.clone(),
            visible: self.visible,
            selectable: self.selectable,
            desktop: self.desktop,
            errors: self.errors.clone(),
        }
    }

    /// Swaps in freshly built stages after a successful reload
    pub fn replace_stages(&mut self, remap: RemapStage, haptic: Option<HapticStage>) {
        self.remap = remap;
        self.haptic = haptic;
        self.errors.clear();
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn set_selectable(&mut self, selectable: bool) {
        self.selectable = selectable;
    }

    pub fn set_desktop(&mut self, desktop: bool) {
        self.desktop = desktop;
    }

    /// Runs the chain for one cycle
    pub fn run(&mut self, ctx: &mut RunContext<'_>) -> Result<Status, ProfileError> {
        let status = self.remap.layer().run(ctx)?;
        if status == Status::Done {
            return Ok(Status::Done);
        }
        match self.haptic.as_mut() {
            Some(haptic) => haptic.layer().run(ctx),
            None => Ok(status),
        }
    }

    pub fn reset(&mut self, settings: &dyn SettingsStore) {
        self.remap.layer().reset(settings);
        if let Some(haptic) = self.haptic.as_mut() {
            haptic.layer().reset(settings);
        }
    }

    /// Releases held desktop input of both stages
    pub fn release(&mut self, desktop: &mut dyn DesktopOutput) -> Result<(), ProfileError> {
        let remap = self.remap.layer().release(desktop);
        let haptic = match self.haptic.as_mut() {
            Some(haptic) => haptic.layer().release(desktop),
            None => Ok(()),
        };
        remap.and(haptic)
    }

    pub fn update(&mut self, settings: &dyn SettingsStore) {
        self.remap.layer().update(settings);
        if let Some(haptic) = self.haptic.as_mut() {
            haptic.layer().update(settings);
        }
    }
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("visible", &self.visible)
            .field("desktop", &self.desktop)
            .field("errors", &self.errors)
            .field("haptic", &self.haptic.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Devices, RecordingDesktop, SyntheticPad, SyntheticPadHandle};
    use crate::haptic::HapticMapper;
    use crate::settings::MemorySettingsStore;

    struct Fixed(Status);

    impl Layer for Fixed {
        fn run(&mut self, _ctx: &mut RunContext<'_>) -> Result<Status, ProfileError> {
            Ok(self.0)
        }
    }

    fn devices() -> (Devices, SyntheticPadHandle, SyntheticPadHandle) {
        let (primary, primary_handle) = SyntheticPad::new("primary");
        let (secondary, _) = SyntheticPad::new("secondary");
        let (virtual_pad, virtual_handle) = SyntheticPad::new("virtual");
        let (desktop, _) = RecordingDesktop::new();
        (
            Devices::new(
                Box::new(primary),
                Box::new(secondary),
                Box::new(virtual_pad),
                Box::new(desktop),
            ),
            primary_handle,
            virtual_handle,
        )
    }

    fn feedback_stage() -> HapticStage {
        HapticStage::Feedback(FeedbackHaptics::fixed(HapticMapper::default()))
    }

    #[test]
    fn done_skips_haptic_stage() {
        let (mut devices, primary, virtual_pad) = devices();
        virtual_pad.set_feedback(255, 255);

        let mut profile =
            Profile::new("Blocked", RemapStage::Custom(Box::new(Fixed(Status::Done)))).with_haptic(feedback_stage());
        let status = profile
            .run(&mut RunContext::new(devices.split()))
            .expect("run");

        assert_eq!(status, Status::Done);
        assert!(primary.take_haptics().is_empty());
    }

    #[test]
    fn continue_runs_haptic_stage() {
        let (mut devices, primary, virtual_pad) = devices();
        virtual_pad.set_feedback(255, 0);

        let mut profile =
            Profile::new("Open", RemapStage::Custom(Box::new(Fixed(Status::Continue)))).with_haptic(feedback_stage());
        let status = profile
            .run(&mut RunContext::new(devices.split()))
            .expect("run");

        assert_eq!(status, Status::Continue);
        assert_eq!(primary.take_haptics().len(), 1);
    }

    #[test]
    fn errors_make_profile_ineligible() {
        let profile = Profile::new("Broken", RemapStage::Custom(Box::new(Fixed(Status::Continue))))
            .with_errors(vec!["bad rule".to_string()]);
        assert!(!profile.is_eligible(false));
        assert!(!profile.is_eligible(true));
    }

    #[test]
    fn unselectable_profile_stays_listed() {
        let profile =
            Profile::new("Guide", RemapStage::Custom(Box::new(Fixed(Status::Continue)))).unselectable();
        assert!(profile.visible());
        assert!(!profile.info().selectable);
        assert!(!profile.is_eligible(false));
        assert!(profile.is_eligible(true));
    }

    #[test]
    fn hidden_profiles_need_default_selection() {
        let profile = Profile::new("Steam", RemapStage::Custom(Box::new(Fixed(Status::Done)))).hidden();
        assert!(!profile.is_eligible(false));
        assert!(profile.is_eligible(true));

        let settings = MemorySettingsStore::new();
        let mut profile = profile;
        profile.reset(&settings);
        assert_eq!(profile.info().name, "Steam");
    }
}
