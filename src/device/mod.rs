//! Device adapters for physical and virtual pads
//!
//! The engine talks to three pads through one interface:
//!
//! ```text
//! primary   (physical) ──► input snapshot ──┐
//! secondary (physical) ──► input snapshot ──┼──► Profile ──► virtual pad (output state)
//!                          haptic commands ◄┘        ▲
//!                                                     └── feedback motor bytes
//! ```
//!
//! - [`gilrs_pad`] - physical pad backed by gilrs
//! - [`synthetic`] - pad whose state is driven through a handle, used as the
//!   driver boundary for the virtual pad and for injecting input in tests
//! - [`desktop`] - keyboard/mouse output used by desktop remapping
//!
//! Wire-level report decoding is a driver concern and lives outside this crate.

pub mod desktop;
pub mod gilrs_pad;
pub mod input;
pub mod synthetic;

pub use desktop::{DesktopAction, DesktopOutput, MouseButton, RecordingDesktop, RecordingDesktopHandle};
pub use gilrs_pad::GilrsPad;
pub use input::{
    BackButton, Buttons, DS4Code, PadFamily, PadState, Stick, VirtualKey, X360Code,
};
pub use synthetic::{SyntheticPad, SyntheticPadHandle};

use crate::error::DeviceError;
use crate::haptic::HapticCommand;
use std::fmt::{self, Display};

/// Feedback motor bytes requested by whatever consumes the virtual pad.
///
/// `None` means the adapter reports no feedback at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Feedback {
    pub large_motor: Option<u8>,
    pub small_motor: Option<u8>,
}

/// Interface every pad adapter implements.
///
/// All methods are called from the tick thread only.
pub trait DeviceAdapter {
    /// Human readable adapter name for logging
    fn name(&self) -> &str;

    /// False while the hardware is absent or disconnected
    fn valid(&self) -> bool;

    /// Reads the next input snapshot. Called once per tick.
    fn refresh(&mut self) -> Result<(), DeviceError>;

    /// Snapshot taken by the last [`refresh`](DeviceAdapter::refresh)
    fn snapshot(&self) -> &PadState;

    /// Feedback bytes currently requested by the consumer
    fn feedback(&self) -> Feedback {
        Feedback::default()
    }

    /// Zeroes both feedback bytes once they have been consumed
    fn reset_feedback(&mut self) {}

    /// Fire-and-forget haptic output. Failures are logged by the adapter.
    fn send_haptic(&mut self, command: HapticCommand);

    /// Writes synthesized state. Only meaningful for the virtual pad.
    fn submit(&mut self, _state: &PadState) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Plugs or unplugs controller emulation. Only meaningful for the virtual pad.
    fn set_connected(&mut self, _connected: bool) {}

    /// Quiesces the device when the engine stops
    fn release(&mut self) {}
}

/// Slot a device occupies in the context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    Primary,
    Secondary,
    Virtual,
}

impl Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRole::Primary => write!(f, "primary"),
            DeviceRole::Secondary => write!(f, "secondary"),
            DeviceRole::Virtual => write!(f, "virtual"),
        }
    }
}

/// The pads and desktop output owned by the context
pub struct Devices {
    pub primary: Box<dyn DeviceAdapter>,
    pub secondary: Box<dyn DeviceAdapter>,
    pub virtual_pad: Box<dyn DeviceAdapter>,
    pub desktop: Box<dyn DesktopOutput>,
}

/// Disjoint mutable views handed to profile stages
pub struct DeviceSplit<'a> {
    /// First valid physical pad, if any
    pub source: Option<&'a mut dyn DeviceAdapter>,
    pub virtual_pad: &'a mut dyn DeviceAdapter,
    pub desktop: &'a mut dyn DesktopOutput,
}

impl Devices {
    pub fn new(
        primary: Box<dyn DeviceAdapter>,
        secondary: Box<dyn DeviceAdapter>,
        virtual_pad: Box<dyn DeviceAdapter>,
        desktop: Box<dyn DesktopOutput>,
    ) -> Self {
        Self {
            primary,
            secondary,
            virtual_pad,
            desktop,
        }
    }

    pub fn get_mut(&mut self, role: DeviceRole) -> &mut dyn DeviceAdapter {
        match role {
            DeviceRole::Primary => self.primary.as_mut(),
            DeviceRole::Secondary => self.secondary.as_mut(),
            DeviceRole::Virtual => self.virtual_pad.as_mut(),
        }
    }

    pub fn get(&self, role: DeviceRole) -> &dyn DeviceAdapter {
        match role {
            DeviceRole::Primary => self.primary.as_ref(),
            DeviceRole::Secondary => self.secondary.as_ref(),
            DeviceRole::Virtual => self.virtual_pad.as_ref(),
        }
    }

    /// Physical pad that currently feeds the profile
    pub fn source_role(&self) -> Option<DeviceRole> {
        if self.primary.valid() {
            Some(DeviceRole::Primary)
        } else if self.secondary.valid() {
            Some(DeviceRole::Secondary)
        } else {
            None
        }
    }

    pub fn split(&mut self) -> DeviceSplit<'_> {
        let source: Option<&mut dyn DeviceAdapter> = if self.primary.valid() {
            Some(self.primary.as_mut())
        } else if self.secondary.valid() {
            Some(self.secondary.as_mut())
        } else {
            None
        };

        DeviceSplit {
            source,
            virtual_pad: self.virtual_pad.as_mut(),
            desktop: self.desktop.as_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> (Devices, SyntheticPadHandle, SyntheticPadHandle) {
        let (primary, primary_handle) = SyntheticPad::new("primary");
        let (secondary, secondary_handle) = SyntheticPad::new("secondary");
        let (virtual_pad, _) = SyntheticPad::new("virtual");
        let (desktop, _) = RecordingDesktop::new();
        (
            Devices::new(
                Box::new(primary),
                Box::new(secondary),
                Box::new(virtual_pad),
                Box::new(desktop),
            ),
            primary_handle,
            secondary_handle,
        )
    }

    #[test]
    fn source_prefers_primary() {
        let (mut devices, _primary, _secondary) = devices();
        assert_eq!(devices.source_role(), Some(DeviceRole::Primary));
        assert_eq!(devices.split().source.map(|pad| pad.name().to_string()), Some("primary".to_string()));
    }

    #[test]
    fn source_falls_back_to_secondary() {
        let (mut devices, primary, _secondary) = devices();
        primary.set_valid(false);
        devices.primary.refresh().ok();
        assert_eq!(devices.source_role(), Some(DeviceRole::Secondary));

        devices.secondary.refresh().ok();
        let split = devices.split();
        assert_eq!(split.source.map(|pad| pad.name().to_string()), Some("secondary".to_string()));
    }

    #[test]
    fn no_source_without_valid_pads() {
        let (mut devices, primary, secondary) = devices();
        primary.set_valid(false);
        secondary.set_valid(false);
        devices.primary.refresh().ok();
        devices.secondary.refresh().ok();
        assert_eq!(devices.source_role(), None);
        assert!(devices.split().source.is_none());
    }
}
