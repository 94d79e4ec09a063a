//! Pad state and the key/button vocabularies used by remapping
//!
//! [`PadState`] is both the point-in-time input snapshot of a physical pad
//! and the synthesized state written to the virtual pad.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

bitflags! {
    /// Digital buttons of a pad, named after the Xbox layout
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u32 {
        const A = 1 << 0;
        const B = 1 << 1;
        const X = 1 << 2;
        const Y = 1 << 3;
        const LB = 1 << 4;
        const RB = 1 << 5;
        const BACK = 1 << 6;
        const START = 1 << 7;
        const GUIDE = 1 << 8;
        const LS = 1 << 9;
        const RS = 1 << 10;
        const DPAD_UP = 1 << 11;
        const DPAD_DOWN = 1 << 12;
        const DPAD_LEFT = 1 << 13;
        const DPAD_RIGHT = 1 << 14;
        const TOUCHPAD = 1 << 15;
        // Back panel
        const L4 = 1 << 16;
        const L5 = 1 << 17;
        const R4 = 1 << 18;
        const R5 = 1 << 19;
    }
}

impl Buttons {
    /// Buttons that exist only on the physical back panel
    pub const BACK_PANEL: Buttons = Buttons::L4
        .union(Buttons::L5)
        .union(Buttons::R4)
        .union(Buttons::R5);
}

/// Analog stick position, both axes in [-1.0, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stick {
    pub x: f32,
    pub y: f32,
}

impl Stick {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Complete state of one pad at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PadState {
    pub buttons: Buttons,
    pub left_stick: Stick,
    pub right_stick: Stick,
    /// Analog trigger travel in [0.0, 1.0]
    pub left_trigger: f32,
    pub right_trigger: f32,
}

impl PadState {
    pub fn pressed(&self, buttons: Buttons) -> bool {
        self.buttons.contains(buttons)
    }
}

/// Virtual controller family the output pad emulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PadFamily {
    #[serde(rename = "x360")]
    Xbox360,
    #[serde(rename = "ds4")]
    DualShock4,
}

impl Display for PadFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PadFamily::Xbox360 => write!(f, "X360"),
            PadFamily::DualShock4 => write!(f, "DS4"),
        }
    }
}

/// The four auxiliary back-panel buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackButton {
    L4,
    L5,
    R4,
    R5,
}

impl BackButton {
    pub const ALL: [BackButton; 4] = [BackButton::L4, BackButton::L5, BackButton::R4, BackButton::R5];

    pub fn button(self) -> Buttons {
        match self {
            BackButton::L4 => Buttons::L4,
            BackButton::L5 => Buttons::L5,
            BackButton::R4 => Buttons::R4,
            BackButton::R5 => Buttons::R5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BackButton::L4 => "L4",
            BackButton::L5 => "L5",
            BackButton::R4 => "R4",
            BackButton::R5 => "R5",
        }
    }
}

/// Keyboard keys that remapping may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VirtualKey {
    #[default]
    None,
    Escape,
    Enter,
    Tab,
    Space,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
    F1,
    F2,
    F3,
    F4,
    F5,
    F11,
    F12,
    LeftShift,
    LeftControl,
    LeftAlt,
    LeftWindows,
    VolumeUp,
    VolumeDown,
    VolumeMute,
    MediaPlayPause,
    MediaNext,
    MediaPrevious,
}

/// Xbox 360 buttons a back-panel button can be remapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum X360Code {
    #[default]
    None,
    A,
    B,
    X,
    Y,
    LB,
    RB,
    Back,
    Start,
    Guide,
    LS,
    RS,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
}

impl X360Code {
    pub fn buttons(self) -> Buttons {
        match self {
            X360Code::None => Buttons::empty(),
            X360Code::A => Buttons::A,
            X360Code::B => Buttons::B,
            X360Code::X => Buttons::X,
            X360Code::Y => Buttons::Y,
            X360Code::LB => Buttons::LB,
            X360Code::RB => Buttons::RB,
            X360Code::Back => Buttons::BACK,
            X360Code::Start => Buttons::START,
            X360Code::Guide => Buttons::GUIDE,
            X360Code::LS => Buttons::LS,
            X360Code::RS => Buttons::RS,
            X360Code::DPadUp => Buttons::DPAD_UP,
            X360Code::DPadDown => Buttons::DPAD_DOWN,
            X360Code::DPadLeft => Buttons::DPAD_LEFT,
            X360Code::DPadRight => Buttons::DPAD_RIGHT,
        }
    }
}

/// DualShock 4 buttons a back-panel button can be remapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DS4Code {
    #[default]
    None,
    Cross,
    Circle,
    Square,
    Triangle,
    L1,
    R1,
    Share,
    Options,
    PS,
    L3,
    R3,
    Touchpad,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
}

impl DS4Code {
    pub fn buttons(self) -> Buttons {
        match self {
            DS4Code::None => Buttons::empty(),
            DS4Code::Cross => Buttons::A,
            DS4Code::Circle => Buttons::B,
            DS4Code::Square => Buttons::X,
            DS4Code::Triangle => Buttons::Y,
            DS4Code::L1 => Buttons::LB,
            DS4Code::R1 => Buttons::RB,
            DS4Code::Share => Buttons::BACK,
            DS4Code::Options => Buttons::START,
            DS4Code::PS => Buttons::GUIDE,
            DS4Code::L3 => Buttons::LS,
            DS4Code::R3 => Buttons::RS,
            DS4Code::Touchpad => Buttons::TOUCHPAD,
            DS4Code::DPadUp => Buttons::DPAD_UP,
            DS4Code::DPadDown => Buttons::DPAD_DOWN,
            DS4Code::DPadLeft => Buttons::DPAD_LEFT,
            DS4Code::DPadRight => Buttons::DPAD_RIGHT,
        }
    }
}

/// Zeroes small stick deflections
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        value
    }
}
