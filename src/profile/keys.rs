//! Edge tracking for buttons that drive keyboard keys

use crate::device::{Buttons, DesktopAction, DesktopOutput, VirtualKey};
use crate::error::ProfileError;

/// Remembers which keys are down and the button that pressed each one, so
/// keys are only pressed and released on edges and a release always names
/// the key that was pressed.
#[derive(Debug, Default, Clone)]
pub struct KeyLatch {
    held: Vec<(Buttons, VirtualKey)>,
}

impl KeyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits press/release actions for every binding whose button changed.
    ///
    /// Held keys whose binding disappeared are released. The latch is
    /// updated after each successful send, so a failure part way through
    /// never repeats or loses an edge on the next call.
    pub fn apply(
        &mut self,
        pressed: Buttons,
        bindings: impl IntoIterator<Item = (Buttons, VirtualKey)>,
        desktop: &mut dyn DesktopOutput,
    ) -> Result<(), ProfileError> {
        let bindings: Vec<(Buttons, VirtualKey)> = bindings
            .into_iter()
            .filter(|(_, key)| *key != VirtualKey::None)
            .collect();

        let mut index = 0;
        while index < self.held.len() {
            let (button, key) = self.held[index];
            if pressed.contains(button) && bindings.contains(&(button, key)) {
                index += 1;
                continue;
            }
            desktop.send(DesktopAction::Key { key, pressed: false })?;
            self.held.remove(index);
        }

        for binding in bindings {
            let (button, key) = binding;
            if pressed.contains(button) && !self.held.contains(&binding) {
                desktop.send(DesktopAction::Key { key, pressed: true })?;
                self.held.push(binding);
            }
        }
        Ok(())
    }

    /// Source buttons currently holding a key down
    pub fn held(&self) -> Buttons {
        self.held
            .iter()
            .fold(Buttons::empty(), |held, (button, _)| held | *button)
    }

    /// Releases every held key. The latch ends up empty even when a send fails.
    pub fn release_all(&mut self, desktop: &mut dyn DesktopOutput) -> Result<(), ProfileError> {
        let mut result: Result<(), ProfileError> = Ok(());
        for (_, key) in self.held.drain(..) {
            if let Err(e) = desktop.send(DesktopAction::Key { key, pressed: false }) {
                if result.is_ok() {
                    result = Err(e.into());
                }
            }
        }
        result
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }
}
