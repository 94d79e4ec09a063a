//! Pad adapter whose state is driven from outside through a handle
//!
//! The handle side plays the role of the driver layer: it supplies decoded
//! input snapshots and the feedback bytes the host requested, and it observes
//! what the engine wrote (output state, haptic commands). The headless binary
//! uses it for the virtual pad, tests use it for all three slots.

use super::{DeviceAdapter, Feedback, PadState};
use crate::error::DeviceError;
use crate::haptic::HapticCommand;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
struct Shared {
    valid: bool,
    input: PadState,
    feedback: Feedback,
    connected: bool,
    output: Option<PadState>,
    haptics: Vec<HapticCommand>,
    refreshes: usize,
    writes: usize,
    fail_refresh: bool,
    fail_haptics: bool,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            valid: true,
            input: PadState::default(),
            feedback: Feedback::default(),
            connected: false,
            output: None,
            haptics: Vec::new(),
            refreshes: 0,
            writes: 0,
            fail_refresh: false,
            fail_haptics: false,
        }
    }
}

/// Adapter side, owned by the context
pub struct SyntheticPad {
    name: String,
    shared: Arc<Mutex<Shared>>,
    valid: bool,
    snapshot: PadState,
}

/// Driver side, kept by whoever feeds the pad
#[derive(Clone)]
pub struct SyntheticPadHandle {
    shared: Arc<Mutex<Shared>>,
}

impl SyntheticPad {
    pub fn new(name: impl Into<String>) -> (Self, SyntheticPadHandle) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            Self {
                name: name.into(),
                shared: shared.clone(),
                valid: true,
                snapshot: PadState::default(),
            },
            SyntheticPadHandle { shared },
        )
    }
}

impl DeviceAdapter for SyntheticPad {
    fn name(&self) -> &str {
        &self.name
    }

    fn valid(&self) -> bool {
        self.valid
    }

    fn refresh(&mut self) -> Result<(), DeviceError> {
        let mut shared = self.shared.lock();
        shared.refreshes += 1;
        if shared.fail_refresh {
            self.valid = false;
            return Err(DeviceError::ReadError(format!(
                "{}: injected read failure",
                self.name
            )));
        }
        self.valid = shared.valid;
        self.snapshot = if shared.valid {
            shared.input
        } else {
            PadState::default()
        };
        Ok(())
    }

    fn snapshot(&self) -> &PadState {
        &self.snapshot
    }

    fn feedback(&self) -> Feedback {
        self.shared.lock().feedback
    }

    fn reset_feedback(&mut self) {
        let mut shared = self.shared.lock();
        shared.feedback.large_motor = shared.feedback.large_motor.map(|_| 0);
        shared.feedback.small_motor = shared.feedback.small_motor.map(|_| 0);
    }

    fn send_haptic(&mut self, command: HapticCommand) {
        let mut shared = self.shared.lock();
        shared.writes += 1;
        if shared.fail_haptics {
            warn!("{}: haptic command {:?} rejected", self.name, command);
            return;
        }
        debug!("{}: haptic {:?}", self.name, command);
        shared.haptics.push(command);
    }

    fn submit(&mut self, state: &PadState) -> Result<(), DeviceError> {
        let mut shared = self.shared.lock();
        shared.writes += 1;
        if !shared.valid {
            return Err(DeviceError::NotConnected(self.name.clone()));
        }
        shared.output = Some(*state);
        Ok(())
    }

    fn set_connected(&mut self, connected: bool) {
        let mut shared = self.shared.lock();
        if shared.connected != connected {
            debug!("{}: connected = {}", self.name, connected);
            shared.connected = connected;
            shared.writes += 1;
        }
        if !connected {
            shared.output = None;
        }
    }

    fn release(&mut self) {
        self.set_connected(false);
    }
}

impl SyntheticPadHandle {
    pub fn set_valid(&self, valid: bool) {
        self.shared.lock().valid = valid;
    }

    pub fn set_input(&self, input: PadState) {
        self.shared.lock().input = input;
    }

    /// Sets the feedback bytes as a host would through the virtual pad
    pub fn set_feedback(&self, large_motor: u8, small_motor: u8) {
        let mut shared = self.shared.lock();
        shared.feedback = Feedback {
            large_motor: Some(large_motor),
            small_motor: Some(small_motor),
        };
    }

    pub fn feedback(&self) -> Feedback {
        self.shared.lock().feedback
    }

    /// Drains the haptic commands received so far
    pub fn take_haptics(&self) -> Vec<HapticCommand> {
        std::mem::take(&mut self.shared.lock().haptics)
    }

    pub fn output(&self) -> Option<PadState> {
        self.shared.lock().output
    }

    pub fn connected(&self) -> bool {
        self.shared.lock().connected
    }

    pub fn refresh_count(&self) -> usize {
        self.shared.lock().refreshes
    }

    /// Number of write operations (haptics, output, connect changes)
    pub fn write_count(&self) -> usize {
        self.shared.lock().writes
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.shared.lock().fail_refresh = fail;
    }

    pub fn fail_haptics(&self, fail: bool) {
        self.shared.lock().fail_haptics = fail;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Buttons;
    use crate::haptic::{HapticPad, HapticStyle};

    #[test]
    fn snapshot_changes_only_on_refresh() {
        let (mut pad, handle) = SyntheticPad::new("pad");
        handle.set_input(PadState {
            buttons: Buttons::A,
            ..Default::default()
        });
        assert!(pad.snapshot().buttons.is_empty());

        pad.refresh().expect("refresh");
        assert!(pad.snapshot().pressed(Buttons::A));
        assert_eq!(handle.refresh_count(), 1);
    }

    #[test]
    fn invalid_pad_reports_empty_snapshot() {
        let (mut pad, handle) = SyntheticPad::new("pad");
        handle.set_input(PadState {
            buttons: Buttons::B,
            ..Default::default()
        });
        handle.set_valid(false);
        pad.refresh().expect("refresh");
        assert!(!pad.valid());
        assert!(pad.snapshot().buttons.is_empty());
    }

    #[test]
    fn reset_feedback_zeroes_both_motors() {
        let (mut pad, handle) = SyntheticPad::new("virtual");
        assert_eq!(pad.feedback(), Feedback::default());

        handle.set_feedback(200, 30);
        assert_eq!(pad.feedback().large_motor, Some(200));
        pad.reset_feedback();
        assert_eq!(
            handle.feedback(),
            Feedback {
                large_motor: Some(0),
                small_motor: Some(0)
            }
        );
    }

    #[test]
    fn failed_haptics_are_swallowed() {
        let (mut pad, handle) = SyntheticPad::new("pad");
        handle.fail_haptics(true);
        pad.send_haptic(HapticCommand {
            pad: HapticPad::Left,
            style: HapticStyle::Weak,
            intensity: 3,
        });
        assert!(handle.take_haptics().is_empty());
        assert_eq!(handle.write_count(), 1);
    }

    #[test]
    fn disconnect_clears_output() {
        let (mut pad, handle) = SyntheticPad::new("virtual");
        pad.set_connected(true);
        pad.submit(&PadState::default()).expect("submit");
        assert!(handle.output().is_some());

        pad.set_connected(false);
        assert!(!handle.connected());
        assert!(handle.output().is_none());
    }
}
