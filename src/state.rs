//! Application state management

use std::sync::Arc;

use crate::cli::RunnerCli;
use crate::settings::Settings;
use crate::supervisor::{OsSupervisor, ProcessIdentity, ProcessManager, ProcessSupervisor};
use crate::Result;

/// Shared state handed to every request
pub struct AppState {
    pub settings: Arc<Settings>,

    /// Runner process lifecycle
    pub manager: Arc<ProcessManager>,

    /// gitlab-runner registration tool
    pub cli: RunnerCli,
}

impl AppState {
    /// State backed by the real OS process table
    pub fn new(settings: Settings) -> Self {
        Self::with_supervisor(settings, Arc::new(OsSupervisor::new()))
    }

    pub fn with_supervisor(settings: Settings, supervisor: Arc<dyn ProcessSupervisor>) -> Self {
        let manager = Arc::new(ProcessManager::new(&settings, supervisor));
        let cli = RunnerCli::new(&settings);

        Self {
            settings: Arc::new(settings),
            manager,
            cli,
        }
    }

    /// Stop the runner if it is running, then start it
    ///
    /// A failed stop is logged and ignored; only the start decides the outcome.
    pub async fn restart_runner(&self, name: &str) -> Result<ProcessIdentity> {
        if let Err(e) = self.manager.stop(name).await {
            tracing::warn!("Warning: failed to stop runner {}: {}", name, e);
        }

        let identity = self.manager.start(name).await?;
        tracing::info!("Runner {} restarted successfully", name);
        Ok(identity)
    }
}
