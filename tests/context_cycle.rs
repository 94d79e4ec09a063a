use padbridge::config::{ProcessConfig, SwitcherConfig};
use padbridge::context::{Context, ContextOptions, ProfileEvent};
use padbridge::device::{
    Buttons, DesktopAction, Devices, Feedback, MouseButton, PadState, RecordingDesktop,
    RecordingDesktopHandle, SyntheticPad, SyntheticPadHandle,
};
use padbridge::error::ProfileError;
use padbridge::haptic::{HapticCommand, HapticPad, HapticStyle};
use padbridge::manager::process::Scanner;
use padbridge::manager::{ProcessManager, ProfileSwitcher, SettingsSync};
use padbridge::profile::{Layer, Profile, RemapStage, RunContext, Status};
use padbridge::settings::{AppSettings, HapticSettings, MemorySettingsStore, SettingsStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Rig {
    context: Context,
    settings: Arc<MemorySettingsStore>,
    primary: SyntheticPadHandle,
    secondary: SyntheticPadHandle,
    virtual_pad: SyntheticPadHandle,
    desktop: RecordingDesktopHandle,
}

fn rig() -> Rig {
    let (primary, primary_handle) = SyntheticPad::new("primary");
    let (secondary, secondary_handle) = SyntheticPad::new("secondary");
    let (virtual_pad, virtual_handle) = SyntheticPad::new("virtual");
    let (desktop, desktop_handle) = RecordingDesktop::new();
    let devices = Devices::new(
        Box::new(primary),
        Box::new(secondary),
        Box::new(virtual_pad),
        Box::new(desktop),
    );
    let settings = Arc::new(MemorySettingsStore::new());
    let mut context = Context::new(devices, settings.clone(), ContextOptions::default());
    context.register_builtin_profiles().expect("builtin profiles");
    Rig {
        context,
        settings,
        primary: primary_handle,
        secondary: secondary_handle,
        virtual_pad: virtual_handle,
        desktop: desktop_handle,
    }
}

fn pressed(buttons: Buttons) -> PadState {
    PadState {
        buttons,
        ..Default::default()
    }
}

struct Idle;

impl Layer for Idle {
    fn run(&mut self, _ctx: &mut RunContext<'_>) -> Result<Status, ProfileError> {
        Ok(Status::Continue)
    }
}

struct Broken;

impl Layer for Broken {
    fn run(&mut self, _ctx: &mut RunContext<'_>) -> Result<Status, ProfileError> {
        Err(ProfileError::StageError {
            profile: "Broken".to_string(),
            reason: "always fails".to_string(),
        })
    }
}

#[test]
fn gamepad_profile_forwards_input_and_rumble() {
    let mut rig = rig();
    assert!(rig.context.select_profile("X360", false));
    rig.context.start(Duration::ZERO);

    rig.primary.set_input(pressed(Buttons::A | Buttons::DPAD_UP));
    rig.virtual_pad.set_feedback(255, 0);
    rig.context.tick();

    let output = rig.virtual_pad.output().expect("virtual pad written");
    assert!(output.pressed(Buttons::A));
    assert!(output.pressed(Buttons::DPAD_UP));
    assert!(rig.virtual_pad.connected());

    assert_eq!(
        rig.primary.take_haptics(),
        vec![HapticCommand {
            pad: HapticPad::Left,
            style: HapticStyle::Weak,
            intensity: 2,
        }]
    );
    assert!(rig.secondary.take_haptics().is_empty());
    assert_eq!(
        rig.virtual_pad.feedback(),
        Feedback {
            large_motor: Some(0),
            small_motor: Some(0)
        }
    );
}

#[test]
fn feedback_is_forwarded_once() {
    let mut rig = rig();
    assert!(rig.context.select_profile("X360", false));
    rig.context.start(Duration::ZERO);

    rig.virtual_pad.set_feedback(255, 0);
    rig.context.tick();
    assert_eq!(rig.primary.take_haptics().len(), 1);

    rig.context.tick();
    assert!(rig.primary.take_haptics().is_empty());
    assert!(rig.secondary.take_haptics().is_empty());
}

#[test]
fn haptic_families_keep_their_own_bounds() {
    let mut rig = rig();
    HapticSettings::X360
        .set_left_intensity(rig.settings.as_ref(), 10)
        .expect("set");

    assert!(rig.context.select_profile("DS4", false));
    rig.context.start(Duration::ZERO);
    rig.virtual_pad.set_feedback(255, 0);
    rig.context.tick();
    assert_eq!(rig.primary.take_haptics()[0].intensity, 2);

    assert!(rig.context.select_profile("X360", false));
    rig.virtual_pad.set_feedback(255, 0);
    rig.context.tick();
    assert_eq!(rig.primary.take_haptics()[0].intensity, 10);
}

#[test]
fn source_falls_back_to_secondary_pad() {
    let mut rig = rig();
    rig.context.select_profile("X360", false);
    rig.context.start(Duration::ZERO);

    rig.primary.fail_refresh(true);
    rig.secondary.set_input(pressed(Buttons::B));
    rig.context.tick();

    assert!(!rig.context.status().primary_valid);
    assert!(rig.context.status().secondary_valid);
    let output = rig.virtual_pad.output().expect("virtual pad written");
    assert!(output.pressed(Buttons::B));
}

#[test]
fn desktop_profile_drives_mouse_and_unplugs_virtual_pad() {
    let mut rig = rig();
    assert!(rig.context.back_to_default());
    assert!(rig.context.status().current_is_desktop);
    rig.context.start(Duration::ZERO);

    rig.primary.set_input(pressed(Buttons::A));
    rig.context.tick();

    assert!(!rig.virtual_pad.connected());
    assert!(rig.desktop.take_actions().contains(&DesktopAction::Mouse {
        button: MouseButton::Left,
        pressed: true
    }));
}

const LEFT_RELEASED: DesktopAction = DesktopAction::Mouse {
    button: MouseButton::Left,
    pressed: false,
};

fn desktop_with_click_held() -> Rig {
    let mut rig = rig();
    assert!(rig.context.back_to_default());
    rig.context.start(Duration::ZERO);
    rig.primary.set_input(pressed(Buttons::A));
    rig.context.tick();
    assert!(!rig.desktop.take_actions().contains(&LEFT_RELEASED));
    rig
}

#[test]
fn switching_away_releases_held_click() {
    let mut rig = desktop_with_click_held();
    assert!(rig.context.select_profile("X360", false));
    assert_eq!(rig.desktop.take_actions(), vec![LEFT_RELEASED]);

    rig.context.tick();
    assert!(rig.desktop.take_actions().is_empty());
    let output = rig.virtual_pad.output().expect("virtual pad written");
    assert!(output.pressed(Buttons::A));
}

#[test]
fn stop_releases_held_click() {
    let mut rig = desktop_with_click_held();
    rig.context.stop();
    assert_eq!(rig.desktop.take_actions(), vec![LEFT_RELEASED]);
}

#[test]
fn disabling_releases_held_click() {
    let mut rig = desktop_with_click_held();
    rig.context.set_request_enable(false);
    rig.context.tick();
    assert_eq!(rig.desktop.take_actions(), vec![LEFT_RELEASED]);

    rig.context.tick();
    assert!(rig.desktop.take_actions().is_empty());
}

#[test]
fn unselectable_profile_is_left_to_defaults() {
    let mut rig = rig();
    rig.context
        .add_profile(Profile::new("Launcher", RemapStage::Custom(Box::new(Idle))).unselectable())
        .expect("add");

    assert!(!rig.context.select_profile("Launcher", false));
    assert!(rig.context.current_profile().is_none());
    assert!(rig.context.select_profile("Launcher", true));
    assert_eq!(rig.context.current_profile().map(Profile::name), Some("Launcher"));
}

#[test]
fn failing_profile_keeps_cycle_running() {
    let mut rig = rig();
    rig.context
        .add_profile(Profile::new("Broken", RemapStage::Custom(Box::new(Broken))))
        .expect("add");
    assert!(rig.context.select_profile("Broken", false));
    rig.context.start(Duration::ZERO);

    for _ in 0..3 {
        rig.virtual_pad.set_feedback(100, 100);
        rig.context.tick();
        assert_eq!(rig.virtual_pad.feedback().large_motor, Some(0));
    }
    assert_eq!(rig.primary.refresh_count(), 3);
    assert_eq!(rig.context.current_profile().map(Profile::name), Some("Broken"));
}

#[test]
fn disabled_engine_unplugs_virtual_pad() {
    let mut rig = rig();
    rig.context.select_profile("X360", false);
    rig.context.start(Duration::ZERO);
    rig.context.tick();
    assert!(rig.virtual_pad.connected());

    rig.context.set_request_enable(false);
    rig.context.tick();
    assert!(!rig.virtual_pad.connected());
    assert!(!rig.context.status().enabled);
}

#[test]
fn stop_is_idempotent_and_releases_devices() {
    let mut rig = rig();
    rig.context.select_profile("X360", false);
    rig.context.start(Duration::ZERO);
    rig.context.start(Duration::ZERO);
    rig.context.tick();
    assert!(rig.virtual_pad.connected());

    rig.context.stop();
    assert!(!rig.virtual_pad.connected());
    let writes = rig.virtual_pad.write_count();
    rig.context.stop();
    rig.context.tick();
    assert_eq!(rig.virtual_pad.write_count(), writes);
    assert!(!rig.context.status().started);
}

#[test]
fn settings_change_reaches_profiles_next_cycle() {
    let mut rig = rig();
    rig.context
        .add_manager(Box::new(SettingsSync::new(rig.settings.subscribe())))
        .expect("add");
    rig.context.select_profile("X360", false);
    rig.context.start(Duration::ZERO);
    rig.context.tick();

    HapticSettings::X360
        .set_left_intensity(rig.settings.as_ref(), 6)
        .expect("set");
    // The manager raises the reload during this cycle, it applies on the next one
    rig.context.tick();
    rig.primary.take_haptics();

    rig.virtual_pad.set_feedback(255, 0);
    rig.context.tick();
    assert_eq!(rig.primary.take_haptics()[0].intensity, 6);
}

#[test]
fn steam_input_switches_to_hidden_profile_and_back() {
    let mut rig = rig();
    let running = Arc::new(parking_lot::Mutex::new(BTreeSet::from(["steam".to_string()])));
    let scanned = running.clone();
    let config = ProcessConfig {
        scan_interval_ms: 100,
        steam_input: true,
        ..Default::default()
    };
    rig.context
        .add_manager(Box::new(ProcessManager::with_scanner(
            &config,
            Box::new(move || {
                let scanned = scanned.clone();
                Box::new(move || scanned.lock().clone()) as Scanner
            }),
        )))
        .expect("add");
    rig.context
        .add_manager(Box::new(ProfileSwitcher::new(
            &SwitcherConfig::default(),
            rig.settings.clone(),
        )))
        .expect("add");

    AppSettings
        .set_default_profile(rig.settings.as_ref(), "X360")
        .expect("set");
    rig.context.back_to_default();
    let mut events = rig.context.subscribe();
    rig.context.start(Duration::ZERO);

    let wait_for = |context: &mut Context, name: &str| {
        let deadline = Instant::now() + Duration::from_secs(5);
        while context.current_profile().map(Profile::name) != Some(name) {
            assert!(Instant::now() < deadline, "timed out waiting for {}", name);
            context.tick();
            std::thread::sleep(Duration::from_millis(5));
        }
    };

    wait_for(&mut rig.context, "Steam");
    assert!(rig.context.state().steam_running);
    assert_eq!(
        events.try_recv().expect("event"),
        ProfileEvent::Changed {
            previous: Some("X360".to_string()),
            current: "Steam".to_string()
        }
    );

    running.lock().clear();
    wait_for(&mut rig.context, "X360");
    rig.context.stop();
}
