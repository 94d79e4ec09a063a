//! Automatic profile selection
//!
//! The switcher reacts to edges only: it requests a profile when the
//! desired target changes and otherwise leaves manual selections alone.
//! Returning to the default only happens when the switcher itself picked
//! the current profile.

use super::{ContextRequest, ContextState, Manager, ManagerContext};
use crate::config::SwitcherConfig;
use crate::error::ManagerError;
use crate::profile::builtin;
use crate::settings::{AppSettings, SettingsStore};
use std::sync::Arc;
use tracing::info;

pub struct ProfileSwitcher {
    settings: Arc<dyn SettingsStore>,
    /// (lowercase process name, profile name)
    applications: Vec<(String, String)>,
    steam_shortcuts: bool,
    target: Option<String>,
    auto_selected: bool,
}

impl ProfileSwitcher {
    pub fn new(config: &SwitcherConfig, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            settings,
            applications: config
                .applications
                .iter()
                .map(|(process, profile)| (process.to_lowercase(), profile.clone()))
                .collect(),
            steam_shortcuts: config.steam_shortcuts,
            target: None,
            auto_selected: false,
        }
    }

    fn desired(&self, state: &ContextState) -> Option<String> {
        if state.steam_uses_steam_input && AppSettings.steam_detection(self.settings.as_ref()) {
            let name = if self.steam_shortcuts {
                builtin::STEAM_SHORTCUTS
            } else {
                builtin::STEAM
            };
            return Some(name.to_string());
        }

        self.applications
            .iter()
            .find(|(process, _)| state.processes.contains(process))
            .map(|(_, profile)| profile.clone())
    }
}

impl Manager for ProfileSwitcher {
    fn name(&self) -> &str {
        "ProfileSwitcher"
    }

    fn stop(&mut self) {
        self.target = None;
    }

    fn tick(&mut self, ctx: &mut ManagerContext<'_>) -> Result<(), ManagerError> {
        let desired = self.desired(ctx.state);
        if desired == self.target {
            return Ok(());
        }

        match &desired {
            Some(name) => {
                info!("Switching to profile {} automatically", name);
                ctx.request(ContextRequest::SelectProfile {
                    name: name.clone(),
                    include_hidden: true,
                });
                self.auto_selected = true;
            }
            None if self.auto_selected => {
                info!("Automatic profile no longer needed, back to default");
                ctx.request(ContextRequest::BackToDefault);
                self.auto_selected = false;
            }
            None => {}
        }
        self.target = desired;
        Ok(())
    }
}
