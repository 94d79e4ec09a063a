//! Haptic mapping from feedback motor bytes to bounded intensity commands
//!
//! The consumer of the virtual pad requests vibration as two motor bytes
//! (0-255). Physical pads take an intensity in decibels instead. The mapping
//! is linear from [`MIN_INTENSITY`] up to a configured maximum:
//!
//! ```text
//! intensity = MIN + (max - MIN) * raw / 255      (integer, truncating)
//! ```
//!
//! A raw value of zero (or no value at all) is idle and produces no command.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Lowest intensity any pad family accepts, in dB
pub const MIN_INTENSITY: i8 = -2;

/// Highest configurable intensity, in dB
pub const MAX_INTENSITY: i8 = 10;

/// Intensity used when nothing is configured
pub const DEFAULT_INTENSITY: i8 = 2;

/// Which haptic actuator of a physical pad is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HapticPad {
    Left,
    Right,
}

/// Waveform style of a haptic command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HapticStyle {
    Disabled,
    #[default]
    Weak,
    Strong,
}

impl Display for HapticStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HapticStyle::Disabled => write!(f, "Disabled"),
            HapticStyle::Weak => write!(f, "Weak"),
            HapticStyle::Strong => write!(f, "Strong"),
        }
    }
}

/// One instruction for a physical pad's vibration motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HapticCommand {
    pub pad: HapticPad,
    pub style: HapticStyle,
    /// Intensity in dB
    pub intensity: i8,
}

/// Clamps a configured maximum into the accepted range.
///
/// Applied when settings are written, never when they are read.
pub fn clamp_intensity(value: i8) -> i8 {
    value.clamp(MIN_INTENSITY, MAX_INTENSITY)
}

/// Maps a raw feedback byte onto an intensity.
///
/// Returns `None` when there is no signal (absent or zero), which means the
/// pad keeps doing whatever it did before.
pub fn map_intensity(raw: Option<u8>, max_intensity: i8) -> Option<i8> {
    let raw = match raw {
        None | Some(0) => return None,
        Some(raw) => i32::from(raw),
    };

    let min = i32::from(MIN_INTENSITY);
    let value = min + (i32::from(max_intensity) - min) * raw / 255;
    Some(value.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8)
}

/// Per-family haptic mapping.
///
/// Every pad family owns its own instance with its own bounds, so changing
/// one family's configuration never leaks into another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HapticMapper {
    pub style: HapticStyle,
    pub left_max: i8,
    pub right_max: i8,
}

impl Default for HapticMapper {
    fn default() -> Self {
        Self {
            style: HapticStyle::default(),
            left_max: DEFAULT_INTENSITY,
            right_max: DEFAULT_INTENSITY,
        }
    }
}

impl HapticMapper {
    pub fn new(style: HapticStyle, left_max: i8, right_max: i8) -> Self {
        Self {
            style,
            left_max,
            right_max,
        }
    }

    /// Builds the command for one pad, or `None` when idle
    pub fn command(&self, pad: HapticPad, raw: Option<u8>) -> Option<HapticCommand> {
        let max = match pad {
            HapticPad::Left => self.left_max,
            HapticPad::Right => self.right_max,
        };
        map_intensity(raw, max).map(|intensity| HapticCommand {
            pad,
            style: self.style,
            intensity,
        })
    }
}
