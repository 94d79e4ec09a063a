//! Physical pad backed by gilrs
//!
//! Each adapter claims one connected gamepad by slot: the primary adapter
//! takes the first gamepad gilrs reports, the secondary adapter the second.
//! Events are drained without blocking on every refresh and the snapshot is
//! rebuilt from gilrs' cached gamepad state.

use super::input::apply_deadzone;
use super::{Buttons, DeviceAdapter, PadState, Stick};
use crate::error::DeviceError;
use crate::haptic::{HapticCommand, HapticPad, HapticStyle, MAX_INTENSITY};
use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Replay, Ticks};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use tracing::{debug, error, info, warn};

/// Analog stick deadzone as a fraction of full deflection
pub const DEFAULT_DEADZONE: f32 = 0.05;

const WEAK_PULSE_MS: u32 = 30;
const STRONG_PULSE_MS: u32 = 60;

const BUTTON_MAP: [(Button, Buttons); 17] = [
    (Button::South, Buttons::A),
    (Button::East, Buttons::B),
    (Button::West, Buttons::X),
    (Button::North, Buttons::Y),
    (Button::LeftTrigger, Buttons::LB),
    (Button::RightTrigger, Buttons::RB),
    (Button::Select, Buttons::BACK),
    (Button::Start, Buttons::START),
    (Button::Mode, Buttons::GUIDE),
    (Button::LeftThumb, Buttons::LS),
    (Button::RightThumb, Buttons::RS),
    (Button::DPadUp, Buttons::DPAD_UP),
    (Button::DPadDown, Buttons::DPAD_DOWN),
    (Button::DPadLeft, Buttons::DPAD_LEFT),
    (Button::DPadRight, Buttons::DPAD_RIGHT),
    // gilrs exposes at most two extra buttons, used for the upper back paddles
    (Button::C, Buttons::L4),
    (Button::Z, Buttons::R4),
];

pub struct GilrsPad {
    name: String,
    gilrs: Gilrs,
    slot: usize,
    deadzone: f32,
    active_gamepad: Option<GamepadId>,
    snapshot: PadState,
    left_effect: Option<Effect>,
    right_effect: Option<Effect>,
}

impl GilrsPad {
    /// Opens gilrs and claims the gamepad at `slot` once one is connected
    pub fn create(name: impl Into<String>, slot: usize, deadzone: f32) -> Result<Self, DeviceError> {
        let name = name.into();
        info!("Initializing gilrs pad {} for slot {}", name, slot);
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(DeviceError::InitializationError(e.to_string()));
            }
        };

        let mut pad = Self {
            name,
            gilrs,
            slot,
            deadzone,
            active_gamepad: None,
            snapshot: PadState::default(),
            left_effect: None,
            right_effect: None,
        };
        pad.select_gamepad();
        Ok(pad)
    }

    /// Lists connected gamepads as (id, name) pairs
    pub fn connected_gamepads(&self) -> Vec<(GamepadId, String)> {
        self.gilrs
            .gamepads()
            .map(|(id, gamepad)| (id, gamepad.name().to_string()))
            .collect()
    }

    fn select_gamepad(&mut self) {
        let selected = self.gilrs.gamepads().nth(self.slot).map(|(id, gamepad)| {
            info!(
                "{}: using gamepad {} ({}), force feedback: {}",
                self.name,
                gamepad.name(),
                id,
                gamepad.is_ff_supported()
            );
            id
        });

        if selected.is_none() && self.active_gamepad.is_some() {
            warn!("{}: gamepad disconnected", self.name);
        }
        self.active_gamepad = selected;
    }

    fn read_state(gamepad: &Gamepad<'_>, deadzone: f32) -> PadState {
        let mut buttons = Buttons::empty();
        for (button, flag) in BUTTON_MAP {
            if gamepad.is_pressed(button) {
                buttons |= flag;
            }
        }

        let axis = |axis: Axis| apply_deadzone(gamepad.value(axis), deadzone);
        let trigger = |button: Button| {
            gamepad
                .button_data(button)
                .map(|data| data.value())
                .unwrap_or(0.0)
        };

        PadState {
            buttons,
            left_stick: Stick::new(axis(Axis::LeftStickX), axis(Axis::LeftStickY)),
            right_stick: Stick::new(axis(Axis::RightStickX), axis(Axis::RightStickY)),
            left_trigger: trigger(Button::LeftTrigger2),
            right_trigger: trigger(Button::RightTrigger2),
        }
    }

    /// Converts a dB intensity into a linear rumble magnitude
    fn magnitude(intensity: i8) -> u16 {
        let db = f32::from(intensity) - f32::from(MAX_INTENSITY);
        let linear = 10f32.powf(db / 20.0).clamp(0.0, 1.0);
        (linear * f32::from(u16::MAX)) as u16
    }
}

impl DeviceAdapter for GilrsPad {
    fn name(&self) -> &str {
        &self.name
    }

    fn valid(&self) -> bool {
        self.active_gamepad.is_some()
    }

    fn refresh(&mut self) -> Result<(), DeviceError> {
        let mut topology_changed = false;
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected | EventType::Disconnected => {
                    debug!("{}: gamepad {} {:?}", self.name, id, event);
                    topology_changed = true;
                }
                _ => {}
            }
        }

        if topology_changed || self.active_gamepad.is_none() {
            self.select_gamepad();
        }

        self.snapshot = match self.active_gamepad {
            Some(id) => match self.gilrs.connected_gamepad(id) {
                Some(gamepad) => Self::read_state(&gamepad, self.deadzone),
                None => {
                    self.active_gamepad = None;
                    PadState::default()
                }
            },
            None => PadState::default(),
        };
        Ok(())
    }

    fn snapshot(&self) -> &PadState {
        &self.snapshot
    }

    fn send_haptic(&mut self, command: HapticCommand) {
        let Some(id) = self.active_gamepad else {
            debug!("{}: dropping haptic, no gamepad", self.name);
            return;
        };

        let slot = match command.pad {
            HapticPad::Left => &mut self.left_effect,
            HapticPad::Right => &mut self.right_effect,
        };

        let (play_for, magnitude) = match command.style {
            HapticStyle::Disabled => {
                // Dropping the effect stops it
                *slot = None;
                return;
            }
            HapticStyle::Weak => (WEAK_PULSE_MS, Self::magnitude(command.intensity)),
            HapticStyle::Strong => (STRONG_PULSE_MS, Self::magnitude(command.intensity)),
        };

        let kind = match command.pad {
            HapticPad::Left => BaseEffectType::Strong { magnitude },
            HapticPad::Right => BaseEffectType::Weak { magnitude },
        };

        let effect = EffectBuilder::new()
            .add_effect(BaseEffect {
                kind,
                scheduling: Replay {
                    play_for: Ticks::from_ms(play_for),
                    ..Default::default()
                },
                ..Default::default()
            })
            .gamepads(&[id])
            .finish(&mut self.gilrs);

        match effect {
            Ok(effect) => {
                if let Err(e) = effect.play() {
                    warn!("{}: failed to play haptic {:?}: {}", self.name, command, e);
                }
                *slot = Some(effect);
            }
            Err(e) => warn!("{}: failed to build haptic {:?}: {}", self.name, command, e),
        }
    }

    fn release(&mut self) {
        self.left_effect = None;
        self.right_effect = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haptic::MIN_INTENSITY;

    #[test]
    fn magnitude_scales_with_intensity() {
        assert_eq!(GilrsPad::magnitude(MAX_INTENSITY), u16::MAX);
        let low = GilrsPad::magnitude(MIN_INTENSITY);
        let mid = GilrsPad::magnitude(4);
        assert!(low < mid);
        assert!(mid < u16::MAX);
        assert!(low > 0);
    }
}
