//! Controller emulation and Steam passthrough remapping

use super::keys::KeyLatch;
use super::{Layer, RunContext, Status};
use crate::device::{BackButton, Buttons, DesktopOutput, PadFamily, VirtualKey};
use crate::error::ProfileError;
use crate::settings::{BackPanelMap, BackPanelSettings, SettingsStore};
use tracing::{debug, warn};

fn back_bindings(map: &BackPanelMap) -> [(Buttons, VirtualKey); 4] {
    BackButton::ALL.map(|back| (back.button(), map.key(back)))
}

/// Routes the source pad to the virtual pad of one controller family.
///
/// Back-panel buttons never reach the virtual pad directly. Each one is
/// replaced by its configured family button and may also send a key.
pub struct GamepadRemap {
    family: PadFamily,
    settings: BackPanelSettings,
    back_panel: BackPanelMap,
    keys: KeyLatch,
}

impl GamepadRemap {
    pub fn new(family: PadFamily, settings: &dyn SettingsStore) -> Self {
        let back_settings = BackPanelSettings::for_family(family);
        Self {
            family,
            settings: back_settings,
            back_panel: back_settings.back_panel_map(settings, Some(family)),
            keys: KeyLatch::new(),
        }
    }

    pub fn family(&self) -> PadFamily {
        self.family
    }

    /// Buttons the emulated family actually has
    fn family_mask(&self) -> Buttons {
        let mask = Buttons::all().difference(Buttons::BACK_PANEL);
        match self.family {
            PadFamily::Xbox360 => mask.difference(Buttons::TOUCHPAD),
            PadFamily::DualShock4 => mask,
        }
    }
}

impl Layer for GamepadRemap {
    fn run(&mut self, ctx: &mut RunContext<'_>) -> Result<Status, ProfileError> {
        let devices = &mut ctx.devices;
        let Some(source) = devices.source.as_ref() else {
            devices.virtual_pad.set_connected(false);
            return Ok(Status::Done);
        };

        let input = *source.snapshot();
        let mut output = input;
        output.buttons &= self.family_mask();
        for back in BackButton::ALL {
            if input.pressed(back.button()) {
                output.buttons |= self.back_panel.buttons(back);
            }
        }

        devices.virtual_pad.set_connected(true);
        devices.virtual_pad.submit(&output)?;

        if devices.desktop.valid() {
            self.keys
                .apply(input.buttons, back_bindings(&self.back_panel), &mut *devices.desktop)?;
        } else if !self.keys.held().is_empty() {
            warn!("Keyboard output lost while back-panel keys were held");
            self.keys.clear();
        }

        Ok(Status::Continue)
    }

    fn release(&mut self, desktop: &mut dyn DesktopOutput) -> Result<(), ProfileError> {
        self.keys.release_all(desktop)
    }

    fn reset(&mut self, settings: &dyn SettingsStore) {
        self.keys.clear();
        self.update(settings);
    }

    fn update(&mut self, settings: &dyn SettingsStore) {
        self.back_panel = self.settings.back_panel_map(settings, Some(self.family));
        debug!("{} back panel: {:?}", self.family, self.back_panel);
    }
}

/// Leaves the pad to Steam: emulation unplugged, chain always done.
///
/// The shortcut variant still sends the desktop back-panel keys.
pub struct Passthrough {
    shortcuts: bool,
    back_panel: BackPanelMap,
    keys: KeyLatch,
}

impl Passthrough {
    pub fn new(shortcuts: bool, settings: &dyn SettingsStore) -> Self {
        Self {
            shortcuts,
            back_panel: Self::load(shortcuts, settings),
            keys: KeyLatch::new(),
        }
    }

    fn load(shortcuts: bool, settings: &dyn SettingsStore) -> BackPanelMap {
        if shortcuts {
            BackPanelSettings::DESKTOP.back_panel_map(settings, None)
        } else {
            BackPanelMap::default()
        }
    }
}

impl Layer for Passthrough {
    fn run(&mut self, ctx: &mut RunContext<'_>) -> Result<Status, ProfileError> {
        let devices = &mut ctx.devices;
        devices.virtual_pad.set_connected(false);

        if self.shortcuts && devices.desktop.valid() {
            let pressed = devices
                .source
                .as_ref()
                .map(|source| source.snapshot().buttons)
                .unwrap_or_default();
            self.keys
                .apply(pressed, back_bindings(&self.back_panel), &mut *devices.desktop)?;
        }

        Ok(Status::Done)
    }

    fn release(&mut self, desktop: &mut dyn DesktopOutput) -> Result<(), ProfileError> {
        self.keys.release_all(desktop)
    }

    fn reset(&mut self, settings: &dyn SettingsStore) {
        self.keys.clear();
        self.update(settings);
    }

    fn update(&mut self, settings: &dyn SettingsStore) {
        self.back_panel = Self::load(self.shortcuts, settings);
    }
}
