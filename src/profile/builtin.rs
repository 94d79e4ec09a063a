//! Built-in profile catalogue

use super::{
    DesktopHaptics, DesktopRemap, FeedbackHaptics, GamepadRemap, HapticStage, Passthrough, Profile, RemapStage,
};
use crate::device::PadFamily;
use crate::settings::{HapticSettings, SettingsStore};

pub const DESKTOP: &str = "Desktop";
pub const STEAM: &str = "Steam";
pub const STEAM_SHORTCUTS: &str = "Steam with Shortcuts";
pub const X360: &str = "X360";
pub const DS4: &str = "DS4";

fn gamepad(name: &str, family: PadFamily, settings: &dyn SettingsStore) -> Profile {
    Profile::new(name, RemapStage::Gamepad(GamepadRemap::new(family, settings))).with_haptic(
        HapticStage::Feedback(FeedbackHaptics::from_settings(
            HapticSettings::for_family(family),
            settings,
        )),
    )
}

/// Builds the built-in profiles in registration order
pub fn builtin_profiles(settings: &dyn SettingsStore) -> Vec<Profile> {
    vec![
        Profile::new(DESKTOP, RemapStage::Desktop(DesktopRemap::new(settings)))
            .with_haptic(HapticStage::Desktop(DesktopHaptics::new(settings)))
            .desktop(),
        Profile::new(STEAM, RemapStage::Passthrough(Passthrough::new(false, settings))).hidden(),
        Profile::new(
            STEAM_SHORTCUTS,
            RemapStage::Passthrough(Passthrough::new(true, settings)),
        )
        .hidden(),
        gamepad(X360, PadFamily::Xbox360, settings),
        gamepad(DS4, PadFamily::DualShock4, settings),
    ]
}
