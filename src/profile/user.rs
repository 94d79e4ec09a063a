//! User profiles described in TOML and interpreted at load time
//!
//! ```toml
//! name = "Racing"
//! visible = true
//! selectable = true
//! desktop = false
//!
//! [[rules]]
//! from = "L4"
//! button = "A"
//!
//! [[rules]]
//! from = "R4"
//! key = "Escape"
//!
//! [haptic]
//! style = "Strong"
//! left = 8
//! right = 4
//! ```
//!
//! Button names are the [`Buttons`] flag names, keys the [`VirtualKey`]
//! variant names. A description that fails validation still yields a
//! profile, carrying its errors so it shows up but cannot be selected.

use super::keys::KeyLatch;
use super::{FeedbackHaptics, HapticStage, Layer, Profile, RemapStage, RunContext, Status};
use crate::device::{Buttons, DesktopOutput, VirtualKey};
use crate::error::ProfileError;
use crate::haptic::{HapticMapper, HapticStyle, DEFAULT_INTENSITY, MAX_INTENSITY, MIN_INTENSITY};
use crate::settings::SettingsStore;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PROFILE_EXTENSION: &str = "toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Description {
    name: String,
    #[serde(default = "visible_by_default")]
    visible: bool,
    /// False keeps the profile out of manual selection, leaving it to the switcher
    #[serde(default = "visible_by_default")]
    selectable: bool,
    #[serde(default)]
    desktop: bool,
    #[serde(default)]
    rules: Vec<RuleDescription>,
    haptic: Option<HapticDescription>,
}

fn visible_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDescription {
    from: String,
    button: Option<String>,
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HapticDescription {
    #[serde(default)]
    style: HapticStyle,
    left: Option<i8>,
    right: Option<i8>,
}

/// What a source button turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    Button(Buttons),
    Key(VirtualKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub from: Buttons,
    pub to: RuleTarget,
}

/// Remap stage interpreting a rule table.
///
/// Unmapped buttons pass through to the virtual pad unless the profile is a
/// desktop profile, in which case only key rules produce output.
#[derive(Debug, Default)]
pub struct RuleRemap {
    rules: Vec<Rule>,
    desktop: bool,
    keys: KeyLatch,
}

impl RuleRemap {
    pub fn new(rules: Vec<Rule>, desktop: bool) -> Self {
        Self {
            rules,
            desktop,
            keys: KeyLatch::new(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn key_bindings(&self) -> Vec<(Buttons, VirtualKey)> {
        self.rules
            .iter()
            .filter_map(|rule| match rule.to {
                RuleTarget::Key(key) => Some((rule.from, key)),
                RuleTarget::Button(_) => None,
            })
            .collect()
    }
}

impl Layer for RuleRemap {
    fn run(&mut self, ctx: &mut RunContext<'_>) -> Result<Status, ProfileError> {
        let devices = &mut ctx.devices;
        let Some(source) = devices.source.as_ref() else {
            devices.virtual_pad.set_connected(false);
            return Ok(Status::Done);
        };
        let input = *source.snapshot();

        if self.desktop {
            devices.virtual_pad.set_connected(false);
            if !devices.desktop.valid() {
                return Ok(Status::Done);
            }
        } else {
            let mut output = input;
            output.buttons.remove(Buttons::BACK_PANEL);
            for rule in &self.rules {
                output.buttons.remove(rule.from);
            }
            for rule in &self.rules {
                if let RuleTarget::Button(button) = rule.to {
                    if input.pressed(rule.from) {
                        output.buttons |= button;
                    }
                }
            }
            devices.virtual_pad.set_connected(true);
            devices.virtual_pad.submit(&output)?;
        }

        if devices.desktop.valid() {
            let bindings = self.key_bindings();
            self.keys.apply(input.buttons, bindings, &mut *devices.desktop)?;
        }
        Ok(Status::Continue)
    }

    fn release(&mut self, desktop: &mut dyn DesktopOutput) -> Result<(), ProfileError> {
        self.keys.release_all(desktop)
    }

    fn reset(&mut self, _settings: &dyn SettingsStore) {
        self.keys.clear();
    }
}

/// A description that passed validation
#[derive(Debug)]
pub struct CompiledProfile {
    pub name: String,
    pub visible: bool,
    pub selectable: bool,
    pub desktop: bool,
    pub remap: RuleRemap,
    pub haptic: Option<FeedbackHaptics>,
}

impl CompiledProfile {
    pub fn into_profile(self) -> Profile {
        let mut profile = Profile::new(self.name, RemapStage::Rules(self.remap)).user_defined();
        profile.set_visible(self.visible);
        profile.set_selectable(self.selectable);
        profile.set_desktop(self.desktop);
        match self.haptic {
            Some(haptic) => profile.with_haptic(HapticStage::Feedback(haptic)),
            None => profile,
        }
    }

    /// Moves the new stages and flags into an existing profile
    pub fn apply_to(self, profile: &mut Profile) {
        profile.set_visible(self.visible);
        profile.set_selectable(self.selectable);
        profile.set_desktop(self.desktop);
        profile.replace_stages(
            RemapStage::Rules(self.remap),
            self.haptic.map(HapticStage::Feedback),
        );
    }
}

/// A description that failed to parse or validate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    /// Name from the description, when it could be parsed
    pub name: Option<String>,
    pub errors: Vec<String>,
}

impl Rejected {
    /// Registered placeholder that shows the errors and is never selectable
    pub fn into_profile(self, fallback_name: &str) -> Profile {
        let name = self.name.unwrap_or_else(|| fallback_name.to_string());
        Profile::new(name, RemapStage::Rules(RuleRemap::default()))
            .user_defined()
            .with_errors(self.errors)
    }
}

fn parse_button(name: &str) -> Option<Buttons> {
    Buttons::from_name(name).filter(|button| !button.is_empty())
}

fn parse_key(name: &str) -> Option<VirtualKey> {
    toml::Value::String(name.to_string())
        .try_into::<VirtualKey>()
        .ok()
        .filter(|key| *key != VirtualKey::None)
}

/// Parses and validates a profile description
pub fn compile(source: &str) -> Result<CompiledProfile, Rejected> {
    let description: Description = toml::from_str(source).map_err(|e| Rejected {
        name: None,
        errors: vec![format!("parse error: {}", e.message())],
    })?;

    let mut errors = Vec::new();
    if description.name.trim().is_empty() {
        errors.push("name must not be empty".to_string());
    }

    let mut rules = Vec::new();
    let mut seen = HashSet::new();
    for (index, rule) in description.rules.iter().enumerate() {
        let number = index + 1;
        let Some(from) = parse_button(&rule.from) else {
            errors.push(format!("rule {}: unknown button '{}'", number, rule.from));
            continue;
        };
        if !seen.insert(from) {
            errors.push(format!("rule {}: button {} is already mapped", number, rule.from));
            continue;
        }

        let to = match (&rule.button, &rule.key) {
            (Some(button), None) => {
                if description.desktop {
                    errors.push(format!("rule {}: desktop profiles cannot emit pad buttons", number));
                    continue;
                }
                match parse_button(button) {
                    Some(button) => RuleTarget::Button(button),
                    None => {
                        errors.push(format!("rule {}: unknown button '{}'", number, button));
                        continue;
                    }
                }
            }
            (None, Some(key)) => match parse_key(key) {
                Some(key) => RuleTarget::Key(key),
                None => {
                    errors.push(format!("rule {}: unknown key '{}'", number, key));
                    continue;
                }
            },
            _ => {
                errors.push(format!(
                    "rule {}: exactly one of `button` or `key` is required",
                    number
                ));
                continue;
            }
        };
        rules.push(Rule { from, to });
    }

    let haptic = match &description.haptic {
        Some(_) if description.desktop => {
            errors.push("desktop profiles have no feedback to map".to_string());
            None
        }
        Some(haptic) => {
            let mut bound = |side: &str, value: Option<i8>| {
                let value = value.unwrap_or(DEFAULT_INTENSITY);
                if !(MIN_INTENSITY..=MAX_INTENSITY).contains(&value) {
                    errors.push(format!(
                        "haptic.{} must be within [{}, {}], got {}",
                        side, MIN_INTENSITY, MAX_INTENSITY, value
                    ));
                }
                value
            };
            let left = bound("left", haptic.left);
            let right = bound("right", haptic.right);
            Some(FeedbackHaptics::fixed(HapticMapper::new(haptic.style, left, right)))
        }
        None => None,
    };

    if !errors.is_empty() {
        return Err(Rejected {
            name: Some(description.name).filter(|name| !name.trim().is_empty()),
            errors,
        });
    }

    Ok(CompiledProfile {
        name: description.name,
        visible: description.visible,
        selectable: description.selectable,
        desktop: description.desktop,
        remap: RuleRemap::new(rules, description.desktop),
        haptic,
    })
}

/// File stem used as the name of descriptions that cannot be parsed
pub fn fallback_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Loads one description. Invalid contents give an errored profile.
pub fn load_file(path: &Path) -> Result<Profile, ProfileError> {
    let source = fs::read_to_string(path).map_err(|e| ProfileError::LoadError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    match compile(&source) {
        Ok(compiled) => {
            info!("Loaded user profile {} from {}", compiled.name, path.display());
            Ok(compiled.into_profile())
        }
        Err(rejected) => {
            warn!(
                "User profile {} has errors: {}",
                path.display(),
                rejected.errors.join("; ")
            );
            Ok(rejected.into_profile(&fallback_name(path)))
        }
    }
}

/// Lists profile description files in name order
pub fn profile_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            info!("No user profiles in {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some(PROFILE_EXTENSION)
        })
        .collect();
    files.sort();
    files
}

/// Loads every description in `dir`. Unreadable files are skipped.
pub fn load_dir(dir: &Path) -> Vec<Profile> {
    profile_files(dir)
        .iter()
        .filter_map(|path| match load_file(path) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("{}", e);
                None
            }
        })
        .collect()
}
