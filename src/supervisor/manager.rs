//! Runner process manager
//!
//! Combines the PID store, the log store and a [`ProcessSupervisor`] into the
//! four lifecycle operations: probe, start, stop and logs.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::{
    LaunchSpec, LogStore, PidRecord, PidStore, ProcessIdentity, ProcessSupervisor, Termination,
    DEFAULT_TAIL_LINES,
};
use crate::settings::Settings;
use crate::utils::validate_runner_name;
use crate::{Error, Result};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Derived runner status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerState {
    Running,
    Stopped,
}

/// Status plus whatever the PID file knows about the live process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStatus {
    pub state: RunnerState,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
}

impl ProcessStatus {
    fn stopped() -> Self {
        Self {
            state: RunnerState::Stopped,
            pid: None,
            started_at: None,
        }
    }
}

/// Manages runner processes by name
pub struct ProcessManager {
    supervisor: Arc<dyn ProcessSupervisor>,
    pids: PidStore,
    logs: LogStore,
    runner_binary: PathBuf,
    config_path: PathBuf,
    working_dir: PathBuf,
    stop_grace: Duration,
    /// Serializes PID file read-modify-write per runner name
    locks: NameLocks,
}

type NameLocks = parking_lot::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Held while operating on one runner; drops its map entry when uncontended
struct NameGuard<'a> {
    locks: &'a NameLocks,
    name: String,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        // One reference in the map and one here means no task is waiting
        let mut locks = self.locks.lock();
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.name);
        }
    }
}

impl ProcessManager {
    pub fn new(settings: &Settings, supervisor: Arc<dyn ProcessSupervisor>) -> Self {
        Self {
            supervisor,
            pids: PidStore::new(&settings.pid_dir),
            logs: LogStore::new(&settings.logs_dir),
            runner_binary: settings.runner_binary.clone(),
            config_path: settings.config_path.clone(),
            working_dir: settings.working_dir.clone(),
            stop_grace: settings.stop_grace,
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn pid_store(&self) -> &PidStore {
        &self.pids
    }

    /// Command line used to launch runner `name`
    pub fn launch_spec(&self, name: &str) -> LaunchSpec {
        let args: Vec<OsString> = vec![
            "run".into(),
            "--config".into(),
            self.config_path.clone().into_os_string(),
            "--working-directory".into(),
            self.working_dir.clone().into_os_string(),
            "-n".into(),
            name.into(),
        ];

        LaunchSpec {
            program: self.runner_binary.clone(),
            args,
            working_dir: self.working_dir.clone(),
        }
    }

    async fn lock_name(&self, name: &str) -> NameGuard<'_> {
        let lock = self.locks.lock().entry(name.to_string()).or_default().clone();
        let guard = lock.clone().lock_owned().await;

        NameGuard {
            locks: &self.locks,
            name: name.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    /// Whether runner `name` is running. Never fails: anything inconsistent reads as stopped
    pub async fn probe(&self, name: &str) -> RunnerState {
        self.status(name).await.state
    }

    /// Like [`probe`](Self::probe), with pid and start time for running runners
    pub async fn status(&self, name: &str) -> ProcessStatus {
        let Ok(name) = validate_runner_name(name) else {
            return ProcessStatus::stopped();
        };

        let _guard = self.lock_name(name).await;

        match self.live_record(name) {
            Some(record) => ProcessStatus {
                state: RunnerState::Running,
                pid: Some(record.pid),
                started_at: record.started_at,
            },
            None => ProcessStatus::stopped(),
        }
    }

    /// The PID record for `name` if its process is alive; stale records are removed
    fn live_record(&self, name: &str) -> Option<PidRecord> {
        let record = match self.pids.read(name) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Discarding unreadable PID file for runner {}: {}", name, e);
                self.remove_record(name);
                return None;
            }
        };

        if self.supervisor.is_alive(&record.identity()) {
            return Some(record);
        }

        tracing::info!(
            "Runner {} (PID {}) is no longer running, removing stale PID file",
            name,
            record.pid
        );
        self.remove_record(name);
        None
    }

    fn remove_record(&self, name: &str) {
        if let Err(e) = self.pids.remove(name) {
            tracing::warn!("Failed to remove PID file for runner {}: {}", name, e);
        }
    }

    /// Launch runner `name` in the background and record its pid
    pub async fn start(&self, name: &str) -> Result<ProcessIdentity> {
        let name = validate_runner_name(name)?;

        let _guard = self.lock_name(name).await;

        if let Some(record) = self.live_record(name) {
            return Err(Error::AlreadyRunning(format!("{} (PID {})", name, record.pid)));
        }

        let log = self.logs.create(name)?;
        let spec = self.launch_spec(name);
        let identity = self.supervisor.spawn(&spec, log)?;

        let record = PidRecord::new(identity);
        if let Err(e) = self.pids.write(name, &record) {
            tracing::error!(
                "Failed to write PID file for runner {}: {}; killing PID {}",
                name,
                e,
                identity.pid
            );
            if let Err(kill_err) = self.supervisor.terminate(identity.pid, Termination::Forceful) {
                tracing::warn!("Failed to kill untracked PID {}: {}", identity.pid, kill_err);
            }
            return Err(e);
        }

        tracing::info!("Started runner {} with PID {}", name, identity.pid);
        Ok(identity)
    }

    /// Signal runner `name` to terminate and drop its PID record
    ///
    /// Returns the signalled pid. Does not wait for exit unless a stop grace
    /// period is configured.
    pub async fn stop(&self, name: &str) -> Result<u32> {
        let name = validate_runner_name(name)?;

        let _guard = self.lock_name(name).await;

        let record = match self.pids.read(name) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(Error::PidRecordNotFound(name.to_string())),
            Err(e) => {
                self.remove_record(name);
                return Err(e);
            }
        };

        let identity = record.identity();
        if !self.supervisor.is_alive(&identity) {
            // Never signal a pid that may have been handed to another process
            self.remove_record(name);
            return Err(Error::ProcessNotRunning(record.pid));
        }

        match self.supervisor.terminate(record.pid, Termination::Graceful) {
            Ok(()) => {}
            Err(Error::ProcessNotRunning(pid)) => {
                self.remove_record(name);
                return Err(Error::ProcessNotRunning(pid));
            }
            Err(e) => return Err(e),
        }

        if !self.stop_grace.is_zero() {
            self.await_exit(name, &identity).await;
        }

        self.remove_record(name);
        tracing::info!("Stopped runner {} (PID {})", name, record.pid);
        Ok(record.pid)
    }

    /// Poll for exit until the grace period runs out, then SIGKILL
    async fn await_exit(&self, name: &str, identity: &ProcessIdentity) {
        let deadline = tokio::time::Instant::now() + self.stop_grace;
        while tokio::time::Instant::now() < deadline {
            if !self.supervisor.is_alive(identity) {
                return;
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }

        if !self.supervisor.is_alive(identity) {
            return;
        }

        tracing::warn!(
            "Runner {} (PID {}) still running after {:?}, sending SIGKILL",
            name,
            identity.pid,
            self.stop_grace
        );
        match self.supervisor.terminate(identity.pid, Termination::Forceful) {
            Ok(()) | Err(Error::ProcessNotRunning(_)) => {}
            Err(e) => tracing::warn!("Failed to kill runner {}: {}", name, e),
        }
    }

    /// Up to the last 1000 lines of output from the latest run of `name`
    pub async fn logs(&self, name: &str) -> Result<String> {
        let name = validate_runner_name(name)?.to_string();
        let logs = self.logs.clone();

        tokio::task::spawn_blocking(move || logs.tail(&name, DEFAULT_TAIL_LINES))
            .await
            .map_err(|e| Error::Other(format!("Log reader task failed: {}", e)))?
    }
}
