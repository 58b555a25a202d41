//! Runner Manager - an HTTP control plane for local GitLab CI runners
//!
//! Registers runners through the `gitlab-runner` CLI, starts and stops them as
//! detached background processes tracked by PID files, and exposes their status
//! and log tails over a small JSON API.

pub mod cli;
pub mod commands;
pub mod config_store;
pub mod server;
pub mod settings;
pub mod supervisor;

mod error;
mod state;
mod utils;

pub use error::{Error, Result};
pub use settings::Settings;
pub use state::AppState;
pub use utils::validate_runner_name;

use std::sync::Arc;

/// Install the global tracing subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("runner_manager=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Initialize and run the runner manager until the server stops or Ctrl-C
pub async fn run() -> Result<()> {
    init_tracing();

    let settings = Settings::from_env();
    let version = commands::version::get_version();

    tracing::info!("GitLab CI Runner Manager");
    tracing::info!("Version: {}", version.version);
    tracing::info!("Git Commit: {} ({})", version.git_commit, version.git_branch);
    tracing::info!("Build Time: {}", version.build_time);
    tracing::info!("Config Path: {:?}", settings.config_path);
    tracing::info!("Runner Binary: {:?}", settings.runner_binary);
    tracing::info!("========================================");

    settings.ensure_directories();

    let listener = server::bind(&settings).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    let state = Arc::new(AppState::new(settings));

    tokio::select! {
        result = server::serve(listener, state) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down; running runners are left in place");
        }
    }

    Ok(())
}
