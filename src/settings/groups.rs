//! Typed settings groups
//!
//! A group is a thin, copyable view over one section of the store. It never
//! caches values; stages read through it when they are built or reset.

use super::{SettingsExt, SettingsStore};
use crate::device::{BackButton, Buttons, DS4Code, PadFamily, VirtualKey, X360Code};
use crate::error::SettingsError;
use crate::haptic::{clamp_intensity, HapticMapper, HapticStyle, DEFAULT_INTENSITY};

/// Haptic style and per-pad intensity bounds of one profile family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HapticSettings {
    section: &'static str,
}

impl HapticSettings {
    pub const X360: HapticSettings = HapticSettings {
        section: "X360HapticSettings",
    };
    pub const DS4: HapticSettings = HapticSettings {
        section: "DS4HapticSettings",
    };
    pub const DESKTOP: HapticSettings = HapticSettings {
        section: "DesktopHapticSettings",
    };

    const STYLE: &'static str = "HapticStyle";
    const LEFT: &'static str = "LeftIntensity";
    const RIGHT: &'static str = "RightIntensity";

    pub fn for_family(family: PadFamily) -> Self {
        match family {
            PadFamily::Xbox360 => Self::X360,
            PadFamily::DualShock4 => Self::DS4,
        }
    }

    pub fn section(&self) -> &'static str {
        self.section
    }

    pub fn style(&self, store: &dyn SettingsStore) -> HapticStyle {
        store.get(self.section, Self::STYLE, HapticStyle::default())
    }

    pub fn set_style(&self, store: &dyn SettingsStore, style: HapticStyle) -> Result<(), SettingsError> {
        store.set(self.section, Self::STYLE, style)
    }

    pub fn left_intensity(&self, store: &dyn SettingsStore) -> i8 {
        store.get(self.section, Self::LEFT, DEFAULT_INTENSITY)
    }

    /// Stores the left bound, clamped into the accepted range
    pub fn set_left_intensity(&self, store: &dyn SettingsStore, value: i8) -> Result<(), SettingsError> {
        store.set(self.section, Self::LEFT, clamp_intensity(value))
    }

    pub fn right_intensity(&self, store: &dyn SettingsStore) -> i8 {
        store.get(self.section, Self::RIGHT, DEFAULT_INTENSITY)
    }

    /// Stores the right bound, clamped into the accepted range
    pub fn set_right_intensity(&self, store: &dyn SettingsStore, value: i8) -> Result<(), SettingsError> {
        store.set(self.section, Self::RIGHT, clamp_intensity(value))
    }

    /// Builds a fresh mapper from the current values
    pub fn mapper(&self, store: &dyn SettingsStore) -> HapticMapper {
        HapticMapper::new(
            self.style(store),
            self.left_intensity(store),
            self.right_intensity(store),
        )
    }
}

/// Remapping of the four back-panel buttons of one profile family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackPanelSettings {
    section: &'static str,
}

impl BackPanelSettings {
    pub const X360: BackPanelSettings = BackPanelSettings {
        section: "X360BackPanelSettings",
    };
    pub const DS4: BackPanelSettings = BackPanelSettings {
        section: "DS4BackPanelSettings",
    };
    pub const DESKTOP: BackPanelSettings = BackPanelSettings {
        section: "DesktopBackPanelSettings",
    };

    pub fn for_family(family: PadFamily) -> Self {
        match family {
            PadFamily::Xbox360 => Self::X360,
            PadFamily::DualShock4 => Self::DS4,
        }
    }

    pub fn section(&self) -> &'static str {
        self.section
    }

    fn key_name(back: BackButton) -> String {
        format!("{}_KEY", back.name())
    }

    fn code_name(back: BackButton, family: PadFamily) -> String {
        format!("{}_{}", back.name(), family)
    }

    /// Keyboard key emitted while `back` is held
    pub fn key(&self, store: &dyn SettingsStore, back: BackButton) -> VirtualKey {
        store.get(self.section, &Self::key_name(back), VirtualKey::None)
    }

    pub fn set_key(
        &self,
        store: &dyn SettingsStore,
        back: BackButton,
        key: VirtualKey,
    ) -> Result<(), SettingsError> {
        store.set(self.section, &Self::key_name(back), key)
    }

    pub fn x360_code(&self, store: &dyn SettingsStore, back: BackButton) -> X360Code {
        store.get(
            self.section,
            &Self::code_name(back, PadFamily::Xbox360),
            X360Code::None,
        )
    }

    pub fn set_x360_code(
        &self,
        store: &dyn SettingsStore,
        back: BackButton,
        code: X360Code,
    ) -> Result<(), SettingsError> {
        store.set(self.section, &Self::code_name(back, PadFamily::Xbox360), code)
    }

    pub fn ds4_code(&self, store: &dyn SettingsStore, back: BackButton) -> DS4Code {
        store.get(
            self.section,
            &Self::code_name(back, PadFamily::DualShock4),
            DS4Code::None,
        )
    }

    pub fn set_ds4_code(
        &self,
        store: &dyn SettingsStore,
        back: BackButton,
        code: DS4Code,
    ) -> Result<(), SettingsError> {
        store.set(self.section, &Self::code_name(back, PadFamily::DualShock4), code)
    }

    /// Virtual buttons `back` is remapped to for the given family
    pub fn family_buttons(&self, store: &dyn SettingsStore, back: BackButton, family: PadFamily) -> Buttons {
        match family {
            PadFamily::Xbox360 => self.x360_code(store, back).buttons(),
            PadFamily::DualShock4 => self.ds4_code(store, back).buttons(),
        }
    }

    /// Snapshot of every back button's key and family mapping
    pub fn back_panel_map(&self, store: &dyn SettingsStore, family: Option<PadFamily>) -> BackPanelMap {
        let mut map = BackPanelMap::default();
        for (index, back) in BackButton::ALL.into_iter().enumerate() {
            map.keys[index] = self.key(store, back);
            map.buttons[index] = family
                .map(|family| self.family_buttons(store, back, family))
                .unwrap_or_else(Buttons::empty);
        }
        map
    }
}

/// Resolved back-panel mapping, indexed in [`BackButton::ALL`] order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackPanelMap {
    pub keys: [VirtualKey; 4],
    pub buttons: [Buttons; 4],
}

impl BackPanelMap {
    pub fn key(&self, back: BackButton) -> VirtualKey {
        self.keys[Self::index(back)]
    }

    pub fn buttons(&self, back: BackButton) -> Buttons {
        self.buttons[Self::index(back)]
    }

    fn index(back: BackButton) -> usize {
        match back {
            BackButton::L4 => 0,
            BackButton::L5 => 1,
            BackButton::R4 => 2,
            BackButton::R5 => 3,
        }
    }
}

/// Application wide settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppSettings;

impl AppSettings {
    pub const SECTION: &'static str = "Application";

    pub fn default_profile(&self, store: &dyn SettingsStore, fallback: &str) -> String {
        store.get(Self::SECTION, "DefaultProfile", fallback.to_string())
    }

    pub fn set_default_profile(&self, store: &dyn SettingsStore, name: &str) -> Result<(), SettingsError> {
        store.set(Self::SECTION, "DefaultProfile", name)
    }

    pub fn steam_detection(&self, store: &dyn SettingsStore) -> bool {
        store.get(Self::SECTION, "EnableSteamDetection", true)
    }

    pub fn set_steam_detection(&self, store: &dyn SettingsStore, enabled: bool) -> Result<(), SettingsError> {
        store.set(Self::SECTION, "EnableSteamDetection", enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haptic::{MAX_INTENSITY, MIN_INTENSITY};
    use crate::settings::MemorySettingsStore;

    #[test]
    fn haptic_defaults() {
        let store = MemorySettingsStore::new();
        let settings = HapticSettings::X360;
        assert_eq!(settings.style(&store), HapticStyle::Weak);
        assert_eq!(settings.left_intensity(&store), DEFAULT_INTENSITY);
        assert_eq!(settings.right_intensity(&store), DEFAULT_INTENSITY);
    }

    #[test]
    fn intensities_are_clamped_on_write() {
        let store = MemorySettingsStore::new();
        let settings = HapticSettings::DS4;
        settings.set_left_intensity(&store, 42).expect("set");
        settings.set_right_intensity(&store, -9).expect("set");
        assert_eq!(settings.left_intensity(&store), MAX_INTENSITY);
        assert_eq!(settings.right_intensity(&store), MIN_INTENSITY);
    }

    #[test]
    fn out_of_range_stored_values_are_read_unchanged() {
        let store = MemorySettingsStore::new();
        store
            .set("X360HapticSettings", "LeftIntensity", 12i8)
            .expect("set");
        assert_eq!(HapticSettings::X360.left_intensity(&store), 12);
    }

    #[test]
    fn families_do_not_share_sections() {
        let store = MemorySettingsStore::new();
        HapticSettings::X360.set_left_intensity(&store, 9).expect("set");
        assert_eq!(HapticSettings::for_family(PadFamily::Xbox360).left_intensity(&store), 9);
        assert_eq!(
            HapticSettings::for_family(PadFamily::DualShock4).left_intensity(&store),
            DEFAULT_INTENSITY
        );
    }

    #[test]
    fn back_panel_codes_per_family() {
        let store = MemorySettingsStore::new();
        let settings = BackPanelSettings::X360;
        settings
            .set_x360_code(&store, BackButton::L4, X360Code::A)
            .expect("set");
        settings
            .set_ds4_code(&store, BackButton::L4, DS4Code::Circle)
            .expect("set");
        settings
            .set_key(&store, BackButton::R5, VirtualKey::Escape)
            .expect("set");

        assert!(store.get_value("X360BackPanelSettings", "L4_X360").is_some());
        assert_eq!(
            settings.family_buttons(&store, BackButton::L4, PadFamily::Xbox360),
            Buttons::A
        );
        assert_eq!(
            settings.family_buttons(&store, BackButton::L4, PadFamily::DualShock4),
            Buttons::B
        );

        let map = settings.back_panel_map(&store, Some(PadFamily::Xbox360));
        assert_eq!(map.buttons(BackButton::L4), Buttons::A);
        assert_eq!(map.key(BackButton::R5), VirtualKey::Escape);
        assert_eq!(map.key(BackButton::L4), VirtualKey::None);
    }

    #[test]
    fn app_settings_fall_back() {
        let store = MemorySettingsStore::new();
        assert_eq!(AppSettings.default_profile(&store, "Desktop"), "Desktop");
        AppSettings.set_default_profile(&store, "X360").expect("set");
        assert_eq!(AppSettings.default_profile(&store, "Desktop"), "X360");
        assert!(AppSettings.steam_detection(&store));
    }
}
