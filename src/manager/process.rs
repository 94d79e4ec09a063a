//! Process watcher
//!
//! Scanning the process table takes milliseconds, far too long for the tick
//! thread. A worker thread scans on an interval and publishes the latest
//! result through a `watch` channel; `tick` only looks at the cached value.

use super::{Manager, ManagerContext};
use crate::config::ProcessConfig;
use crate::error::ManagerError;
use std::collections::BTreeSet;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, System};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub type Scanner = Box<dyn FnMut() -> BTreeSet<String> + Send>;
pub type ScannerFactory = Box<dyn Fn() -> Scanner>;

struct Worker {
    stop_tx: std_mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
    snapshots: watch::Receiver<Arc<BTreeSet<String>>>,
}

pub struct ProcessManager {
    interval: Duration,
    steam_processes: Vec<String>,
    steam_input: bool,
    scanner: ScannerFactory,
    worker: Option<Worker>,
}

/// Lowercase names of all running processes
fn scan_system(system: &mut System) -> BTreeSet<String> {
    system.refresh_processes(ProcessesToUpdate::All, true);
    system
        .processes()
        .values()
        .map(|process| process.name().to_string_lossy().to_lowercase())
        .collect()
}

impl ProcessManager {
    pub fn new(config: &ProcessConfig) -> Self {
        Self::with_scanner(
            config,
            Box::new(|| {
                let mut system = System::new();
                Box::new(move || scan_system(&mut system)) as Scanner
            }),
        )
    }

    /// Uses `scanner` to build the scan function each time the worker starts
    pub fn with_scanner(config: &ProcessConfig, scanner: ScannerFactory) -> Self {
        Self {
            interval: config.scan_interval(),
            steam_processes: config
                .steam_processes
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
            steam_input: config.steam_input,
            scanner,
            worker: None,
        }
    }

    fn spawn_worker(&self) -> Result<Worker, ManagerError> {
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (snapshot_tx, snapshots) = watch::channel(Arc::new(BTreeSet::new()));
        let mut scan = (self.scanner)();
        let interval = self.interval;

        let thread = thread::Builder::new()
            .name("process-scan".to_string())
            .spawn(move || {
                debug!("Process scan worker started, interval {:?}", interval);
                loop {
                    let processes = scan();
                    if snapshot_tx.send(Arc::new(processes)).is_err() {
                        debug!("Process snapshot receiver dropped");
                        break;
                    }
                    match stop_rx.recv_timeout(interval) {
                        Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                }
                debug!("Process scan worker finished");
            })
            .map_err(|e| ManagerError::StartError {
                manager: self.name().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Worker {
            stop_tx,
            thread: Some(thread),
            snapshots,
        })
    }
}

impl Manager for ProcessManager {
    fn name(&self) -> &str {
        "ProcessManager"
    }

    fn start(&mut self) -> Result<(), ManagerError> {
        if self.worker.is_some() {
            return Ok(());
        }
        self.worker = Some(self.spawn_worker()?);
        info!("Process watcher started");
        Ok(())
    }

    fn stop(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        let _ = worker.stop_tx.send(());
        if let Some(thread) = worker.thread.take() {
            if thread.join().is_err() {
                error!("Process scan worker panicked");
            }
        }
        info!("Process watcher stopped");
    }

    fn tick(&mut self, ctx: &mut ManagerContext<'_>) -> Result<(), ManagerError> {
        let Some(worker) = self.worker.as_mut() else {
            return Ok(());
        };

        match worker.snapshots.has_changed() {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(_) => {
                warn!("Process scan worker is gone");
                self.worker = None;
                return Err(ManagerError::WorkerDisconnected(self.name().to_string()));
            }
        }

        let processes = worker.snapshots.borrow_and_update().clone();
        let steam_running = self
            .steam_processes
            .iter()
            .any(|name| processes.contains(name));

        if steam_running != ctx.state.steam_running {
            info!("Steam running: {}", steam_running);
        }
        ctx.state.steam_running = steam_running;
        ctx.state.steam_uses_steam_input = steam_running && self.steam_input;
        ctx.state.processes = processes;
        Ok(())
    }
}

impl Drop for ProcessManager {
    fn drop(&mut self) {
        self.stop();
    }
}
