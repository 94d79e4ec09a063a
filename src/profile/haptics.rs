//! Haptic stages run after a remap stage that did not finish the chain

use super::{Layer, RunContext, Status};
use crate::error::ProfileError;
use crate::haptic::{HapticCommand, HapticMapper, HapticPad, HapticStyle, MIN_INTENSITY};
use crate::settings::{HapticSettings, SettingsStore};
use tracing::{debug, trace};

/// Forwards the virtual pad's feedback bytes to the source pad.
///
/// Large motor drives the left pad, small motor the right one. Feedback is
/// only read here; the context zeroes it after the profile ran.
#[derive(Debug)]
pub struct FeedbackHaptics {
    settings: Option<HapticSettings>,
    mapper: HapticMapper,
}

impl FeedbackHaptics {
    /// Mapper bounds follow the given settings group
    pub fn from_settings(group: HapticSettings, settings: &dyn SettingsStore) -> Self {
        Self {
            settings: Some(group),
            mapper: group.mapper(settings),
        }
    }

    /// Mapper bounds fixed at construction
    pub fn fixed(mapper: HapticMapper) -> Self {
        Self {
            settings: None,
            mapper,
        }
    }

    pub fn mapper(&self) -> &HapticMapper {
        &self.mapper
    }
}

impl Layer for FeedbackHaptics {
    fn run(&mut self, ctx: &mut RunContext<'_>) -> Result<Status, ProfileError> {
        let devices = &mut ctx.devices;
        let feedback = devices.virtual_pad.feedback();
        let Some(source) = devices.source.as_mut() else {
            return Ok(Status::Continue);
        };

        let commands = [
            self.mapper.command(HapticPad::Left, feedback.large_motor),
            self.mapper.command(HapticPad::Right, feedback.small_motor),
        ];
        for command in commands.into_iter().flatten() {
            trace!("Haptic {:?} -> {}", command, source.name());
            source.send_haptic(command);
        }
        Ok(Status::Continue)
    }

    fn reset(&mut self, settings: &dyn SettingsStore) {
        self.update(settings);
    }

    fn update(&mut self, settings: &dyn SettingsStore) {
        if let Some(group) = self.settings {
            self.mapper = group.mapper(settings);
        }
    }
}

/// Silences the source pad once per activation when desktop haptics are
/// configured as disabled.
pub struct DesktopHaptics {
    settings: HapticSettings,
    style: HapticStyle,
    sent: bool,
}

impl DesktopHaptics {
    pub fn new(settings: &dyn SettingsStore) -> Self {
        let group = HapticSettings::DESKTOP;
        Self {
            settings: group,
            style: group.style(settings),
            sent: false,
        }
    }
}

impl Layer for DesktopHaptics {
    fn run(&mut self, ctx: &mut RunContext<'_>) -> Result<Status, ProfileError> {
        if self.sent || self.style != HapticStyle::Disabled {
            return Ok(Status::Continue);
        }
        let Some(source) = ctx.devices.source.as_mut() else {
            return Ok(Status::Continue);
        };

        debug!("Disabling haptics on {}", source.name());
        for pad in [HapticPad::Left, HapticPad::Right] {
            source.send_haptic(HapticCommand {
                pad,
                style: HapticStyle::Disabled,
                intensity: MIN_INTENSITY,
            });
        }
        self.sent = true;
        Ok(Status::Continue)
    }

    fn reset(&mut self, settings: &dyn SettingsStore) {
        self.sent = false;
        self.update(settings);
    }

    fn update(&mut self, settings: &dyn SettingsStore) {
        let style = self.settings.style(settings);
        if style != self.style {
            self.style = style;
            self.sent = false;
        }
    }
}
