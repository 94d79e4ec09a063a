//! Keyboard and mouse output used while a desktop profile is active

use super::VirtualKey;
use crate::error::DeviceError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Number of actions a [`RecordingDesktop`] keeps before dropping the oldest
const RECORD_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// One synthesized keyboard or mouse action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopAction {
    Key { key: VirtualKey, pressed: bool },
    Mouse { button: MouseButton, pressed: bool },
    MouseMove { dx: i32, dy: i32 },
    Scroll { lines: i32 },
}

/// Sink for keyboard and mouse input.
///
/// Its validity is exposed as `KeyboardMouseValid` for display.
pub trait DesktopOutput {
    fn valid(&self) -> bool;

    fn send(&mut self, action: DesktopAction) -> Result<(), DeviceError>;
}

#[derive(Debug)]
struct Recorded {
    valid: bool,
    actions: VecDeque<DesktopAction>,
}

/// Desktop output that records what it was asked to do.
///
/// Native input injection is platform glue outside this crate; this sink
/// logs each action and keeps the most recent ones for inspection.
pub struct RecordingDesktop {
    shared: Arc<Mutex<Recorded>>,
}

#[derive(Clone)]
pub struct RecordingDesktopHandle {
    shared: Arc<Mutex<Recorded>>,
}

impl RecordingDesktop {
    pub fn new() -> (Self, RecordingDesktopHandle) {
        let shared = Arc::new(Mutex::new(Recorded {
            valid: true,
            actions: VecDeque::new(),
        }));
        (
            Self {
                shared: shared.clone(),
            },
            RecordingDesktopHandle { shared },
        )
    }
}

impl DesktopOutput for RecordingDesktop {
    fn valid(&self) -> bool {
        self.shared.lock().valid
    }

    fn send(&mut self, action: DesktopAction) -> Result<(), DeviceError> {
        let mut shared = self.shared.lock();
        if !shared.valid {
            return Err(DeviceError::NotConnected("desktop output".to_string()));
        }
        debug!("Desktop action: {:?}", action);
        if shared.actions.len() == RECORD_CAPACITY {
            shared.actions.pop_front();
        }
        shared.actions.push_back(action);
        Ok(())
    }
}

impl RecordingDesktopHandle {
    pub fn set_valid(&self, valid: bool) {
        self.shared.lock().valid = valid;
    }

    pub fn take_actions(&self) -> Vec<DesktopAction> {
        self.shared.lock().actions.drain(..).collect()
    }
}
