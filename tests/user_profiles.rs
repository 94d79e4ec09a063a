use padbridge::context::{Context, ContextOptions, ProfileEvent};
use padbridge::device::{
    Buttons, DesktopAction, Devices, PadState, RecordingDesktop, RecordingDesktopHandle,
    SyntheticPad, SyntheticPadHandle, VirtualKey,
};
use padbridge::settings::MemorySettingsStore;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const PADDLES: &str = r#"
name = "Paddles"

[[rules]]
from = "L4"
button = "A"

[[rules]]
from = "R4"
key = "Escape"
"#;

const BROKEN: &str = r#"
name = "Paddles"

[[rules]]
from = "Nope"
button = "A"
"#;

struct Rig {
    context: Context,
    primary: SyntheticPadHandle,
    virtual_pad: SyntheticPadHandle,
    desktop: RecordingDesktopHandle,
}

fn rig(profile_dir: &Path) -> Rig {
    let (primary, primary_handle) = SyntheticPad::new("primary");
    let (secondary, _) = SyntheticPad::new("secondary");
    let (virtual_pad, virtual_handle) = SyntheticPad::new("virtual");
    let (desktop, desktop_handle) = RecordingDesktop::new();
    let devices = Devices::new(
        Box::new(primary),
        Box::new(secondary),
        Box::new(virtual_pad),
        Box::new(desktop),
    );
    let mut context = Context::new(
        devices,
        Arc::new(MemorySettingsStore::new()),
        ContextOptions::default(),
    );
    context.register_builtin_profiles().expect("builtin profiles");
    context.load_user_profiles(profile_dir);
    Rig {
        context,
        primary: primary_handle,
        virtual_pad: virtual_handle,
        desktop: desktop_handle,
    }
}

fn press(rig: &Rig, buttons: Buttons) {
    rig.primary.set_input(PadState {
        buttons,
        ..Default::default()
    });
}

#[test]
fn user_profiles_register_after_builtins() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("paddles.toml"), PADDLES).expect("write");
    fs::write(dir.path().join("broken.toml"), "name = ").expect("write");

    let rig = rig(dir.path());
    let profiles = rig.context.profiles();
    let names: Vec<&str> = profiles.iter().map(|info| info.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Desktop",
            "Steam",
            "Steam with Shortcuts",
            "X360",
            "DS4",
            "broken",
            "Paddles"
        ]
    );
    assert!(!profiles[5].errors.is_empty());
    assert!(profiles[6].errors.is_empty());
}

#[test]
fn errored_profile_is_never_selected() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("paddles.toml"), BROKEN).expect("write");

    let mut rig = rig(dir.path());
    assert!(!rig.context.select_profile("Paddles", false));
    assert!(!rig.context.select_profile("Paddles", true));
    assert!(rig.context.current_profile().is_none());
}

#[test]
fn rules_remap_buttons_and_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("paddles.toml"), PADDLES).expect("write");

    let mut rig = rig(dir.path());
    assert!(rig.context.select_profile("Paddles", false));
    rig.context.start(Duration::ZERO);

    press(&rig, Buttons::L4 | Buttons::R4);
    rig.context.tick();

    let output = rig.virtual_pad.output().expect("virtual pad written");
    assert!(output.pressed(Buttons::A));
    assert!(!output.pressed(Buttons::L4));
    assert!(!output.pressed(Buttons::R4));
    assert_eq!(
        rig.desktop.take_actions(),
        vec![DesktopAction::Key {
            key: VirtualKey::Escape,
            pressed: true
        }]
    );
}

#[test]
fn failed_reload_keeps_previous_version_running() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("paddles.toml"), PADDLES).expect("write");

    let mut rig = rig(dir.path());
    assert!(rig.context.select_profile("Paddles", false));
    rig.context.start(Duration::ZERO);
    let mut events = rig.context.subscribe();

    assert!(rig.context.reload_user_profile("paddles", BROKEN).is_err());
    match events.try_recv().expect("event") {
        ProfileEvent::ErrorsChanged { profile, errors } => {
            assert_eq!(profile, "Paddles");
            assert!(!errors.is_empty());
        }
        other => panic!("unexpected event {:?}", other),
    }

    press(&rig, Buttons::L4);
    rig.context.tick();
    assert_eq!(
        rig.context.current_profile().map(|profile| profile.name()),
        Some("Paddles")
    );
    let output = rig.virtual_pad.output().expect("virtual pad written");
    assert!(output.pressed(Buttons::A));

    rig.context.reload_user_profile("paddles", PADDLES).expect("valid again");
    assert!(rig
        .context
        .current_profile()
        .map(|profile| profile.errors().is_empty())
        .unwrap_or(false));
}
