use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use padbridge::config::AppConfig;
use padbridge::context::{Context, ContextOptions};
use padbridge::device::{
    gilrs_pad::DEFAULT_DEADZONE, DeviceAdapter, Devices, GilrsPad, RecordingDesktop, SyntheticPad,
};
use padbridge::engine::{DriverOptions, TickDriver};
use padbridge::manager::{
    ProcessManager, ProfileSwitcher, SettingsSync, SharedData, SharedDataPublisher,
};
use padbridge::profile::{builtin_profiles, user};
use padbridge::settings::{SettingsStore, TomlSettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const OUTPUT_NOTE: &str = "Virtual pad and desktop output are recorded in memory only. \
This build carries no virtual controller driver and no native keyboard or mouse injection.";

#[derive(Parser, Debug)]
#[command(name = "padbridge")]
#[command(version, about, after_help = OUTPUT_NOTE)]
struct Args {
    /// Path to config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the registered profiles and exit
    #[arg(long)]
    list_profiles: bool,

    /// Run with synthetic pads instead of real hardware
    #[arg(long)]
    headless: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup(args.verbose)?;

    let config_path = match args.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::load(&config_path)?;
    let profile_dir = config.profile_dir(&config_path);
    let settings: Arc<dyn SettingsStore> =
        Arc::new(TomlSettingsStore::open(config.settings_path(&config_path))?);

    if args.list_profiles {
        list_profiles(settings.as_ref(), &profile_dir);
        return Ok(());
    }

    info!("Initializing devices");
    warn!("{}", OUTPUT_NOTE);
    let devices = setup_devices(&config, args.headless);

    let mut context = Context::new(
        devices,
        settings.clone(),
        ContextOptions {
            default_profile: config.engine.default_profile.clone(),
            device_budget: config.engine.device_budget(),
        },
    );
    context.register_builtin_profiles()?;
    let loaded = context.load_user_profiles(&profile_dir);
    info!("Loaded {} user profiles from {}", loaded, profile_dir.display());

    let (publisher, shared) = SharedDataPublisher::new();
    context.add_manager(Box::new(ProcessManager::new(&config.processes)))?;
    context.add_manager(Box::new(SettingsSync::new(settings.subscribe())))?;
    context.add_manager(Box::new(ProfileSwitcher::new(&config.switcher, settings.clone())))?;
    context.add_manager(Box::new(publisher))?;
    tokio::spawn(watch_shared_data(shared));

    let (driver, handle) = TickDriver::create(
        context,
        DriverOptions {
            tick_interval: config.engine.tick_interval(),
            resume_delay: config.engine.resume_delay(),
            profile_dir: Some(profile_dir),
        },
    );
    let driver = driver.start(Duration::ZERO);

    let signal = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        handle.shutdown();
    };

    let (stopped, ()) = tokio::join!(driver.run(), signal);
    let status = stopped.context().status();
    info!(
        "Engine stopped, last profile: {}",
        status.current_profile.as_deref().unwrap_or("<none>")
    );
    Ok(())
}

fn setup(verbose: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;

    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| eyre!("Failed to install logger: {}", e))?;
    Ok(())
}

fn setup_devices(config: &AppConfig, headless: bool) -> Devices {
    let (virtual_pad, _virtual_handle) = SyntheticPad::new("virtual");
    let (desktop, _desktop_handle) = RecordingDesktop::new();

    let (primary, secondary): (Box<dyn DeviceAdapter>, Box<dyn DeviceAdapter>) = if headless {
        info!("Headless mode, using synthetic pads");
        (
            Box::new(SyntheticPad::new("primary").0),
            Box::new(SyntheticPad::new("secondary").0),
        )
    } else {
        let deadzone = if config.engine.stick_deadzone > 0.0 {
            config.engine.stick_deadzone
        } else {
            DEFAULT_DEADZONE
        };
        (
            physical_pad("primary", 0, deadzone),
            physical_pad("secondary", 1, deadzone),
        )
    };

    Devices::new(primary, secondary, Box::new(virtual_pad), Box::new(desktop))
}

fn physical_pad(name: &str, slot: usize, deadzone: f32) -> Box<dyn DeviceAdapter> {
    match GilrsPad::create(name, slot, deadzone) {
        Ok(pad) => Box::new(pad),
        Err(e) => {
            warn!("No {} pad available: {}", name, e);
            let (pad, handle) = SyntheticPad::new(name);
            handle.set_valid(false);
            Box::new(pad)
        }
    }
}

fn list_profiles(settings: &dyn SettingsStore, profile_dir: &std::path::Path) {
    let profiles = builtin_profiles(settings)
        .into_iter()
        .chain(user::load_dir(profile_dir));
    for profile in profiles {
        let info = profile.info();
        let mut flags = Vec::new();
        if !info.visible {
            flags.push("hidden");
        }
        if !info.selectable {
            flags.push("unselectable");
        }
        if info.desktop {
            flags.push("desktop");
        }
        println!("{:<24} {}", info.name, flags.join(","));
        for error in &info.errors {
            println!("    error: {}", error);
        }
    }
}

async fn watch_shared_data(mut shared: watch::Receiver<SharedData>) {
    let mut steam_running = false;
    while shared.changed().await.is_ok() {
        let data = shared.borrow_and_update().clone();
        debug!(
            "Status at {}: profile {:?}, {} updates/s",
            data.published_at.format("%H:%M:%S"),
            data.status.current_profile,
            data.status.updates_per_sec
        );
        if data.steam_running != steam_running {
            info!("Steam running: {}", data.steam_running);
            steam_running = data.steam_running;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn help_mentions_recorded_output() {
        let help = Args::command().render_help().to_string();
        assert!(help.contains("recorded in memory only"));
    }
}
