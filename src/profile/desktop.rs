//! Desktop remapping: the pad drives keyboard and mouse
//!
//! Left stick moves the pointer, right stick scrolls, face buttons click and
//! the d-pad sends arrow keys. Back-panel buttons send the keys configured in
//! `DesktopBackPanelSettings`. Controller emulation stays unplugged.

use super::keys::KeyLatch;
use super::{Layer, RunContext, Status};
use crate::device::{BackButton, Buttons, DesktopAction, DesktopOutput, MouseButton, VirtualKey};
use crate::error::ProfileError;
use crate::settings::{BackPanelMap, BackPanelSettings, SettingsStore};
use tracing::trace;

/// Pointer speed at full deflection, in pixels per cycle
const POINTER_SPEED: f32 = 12.0;

/// Scroll lines per cycle at full deflection
const SCROLL_RATE: f32 = 0.08;

const CLICKS: [(Buttons, MouseButton); 3] = [
    (Buttons::A, MouseButton::Left),
    (Buttons::B, MouseButton::Right),
    (Buttons::RS, MouseButton::Middle),
];

const KEYS: [(Buttons, VirtualKey); 9] = [
    (Buttons::DPAD_UP, VirtualKey::Up),
    (Buttons::DPAD_DOWN, VirtualKey::Down),
    (Buttons::DPAD_LEFT, VirtualKey::Left),
    (Buttons::DPAD_RIGHT, VirtualKey::Right),
    (Buttons::START, VirtualKey::Enter),
    (Buttons::BACK, VirtualKey::Escape),
    (Buttons::X, VirtualKey::Backspace),
    (Buttons::LB, VirtualKey::PageUp),
    (Buttons::RB, VirtualKey::PageDown),
];

pub struct DesktopRemap {
    settings: BackPanelSettings,
    back_panel: BackPanelMap,
    clicks_held: Buttons,
    keys: KeyLatch,
    /// Fractional scroll carried between cycles
    scroll: f32,
}

impl DesktopRemap {
    pub fn new(settings: &dyn SettingsStore) -> Self {
        let back_settings = BackPanelSettings::DESKTOP;
        Self {
            settings: back_settings,
            back_panel: back_settings.back_panel_map(settings, None),
            clicks_held: Buttons::empty(),
            keys: KeyLatch::new(),
            scroll: 0.0,
        }
    }

    fn bindings(&self) -> impl Iterator<Item = (Buttons, VirtualKey)> + '_ {
        KEYS.into_iter().chain(
            BackButton::ALL
                .into_iter()
                .map(|back| (back.button(), self.back_panel.key(back))),
        )
    }

    pub fn scroll_remainder(&self) -> f32 {
        self.scroll
    }
}

impl Layer for DesktopRemap {
    fn run(&mut self, ctx: &mut RunContext<'_>) -> Result<Status, ProfileError> {
        let devices = &mut ctx.devices;
        devices.virtual_pad.set_connected(false);

        if !devices.desktop.valid() {
            trace!("Keyboard/mouse output unavailable");
            return Ok(Status::Done);
        }

        let Some(source) = devices.source.as_ref() else {
            return Ok(Status::Continue);
        };
        let state = *source.snapshot();
        let desktop = &mut *devices.desktop;

        for (button, mouse) in CLICKS {
            let now = state.pressed(button);
            if now != self.clicks_held.contains(button) {
                desktop.send(DesktopAction::Mouse {
                    button: mouse,
                    pressed: now,
                })?;
                self.clicks_held.set(button, now);
            }
        }

        let bindings: Vec<(Buttons, VirtualKey)> = self.bindings().collect();
        self.keys.apply(state.buttons, bindings, desktop)?;

        let dx = (state.left_stick.x * POINTER_SPEED) as i32;
        let dy = (-state.left_stick.y * POINTER_SPEED) as i32;
        if dx != 0 || dy != 0 {
            desktop.send(DesktopAction::MouseMove { dx, dy })?;
        }

        self.scroll += state.right_stick.y * SCROLL_RATE;
        let lines = self.scroll.trunc();
        if lines != 0.0 {
            self.scroll -= lines;
            desktop.send(DesktopAction::Scroll {
                lines: lines as i32,
            })?;
        }

        Ok(Status::Continue)
    }

    fn release(&mut self, desktop: &mut dyn DesktopOutput) -> Result<(), ProfileError> {
        let mut result: Result<(), ProfileError> = Ok(());
        for (button, mouse) in CLICKS {
            if !self.clicks_held.contains(button) {
                continue;
            }
            self.clicks_held.remove(button);
            if let Err(e) = desktop.send(DesktopAction::Mouse {
                button: mouse,
                pressed: false,
            }) {
                if result.is_ok() {
                    result = Err(e.into());
                }
            }
        }
        let keys = self.keys.release_all(desktop);
        result.and(keys)
    }

    fn reset(&mut self, settings: &dyn SettingsStore) {
        self.clicks_held = Buttons::empty();
        self.keys.clear();
        self.scroll = 0.0;
        self.update(settings);
    }

    fn update(&mut self, settings: &dyn SettingsStore) {
        self.back_panel = self.settings.back_panel_map(settings, None);
    }
}
