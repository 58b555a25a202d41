//! Runtime settings
//!
//! Every path the manager touches is fixed at process start and carried in
//! [`Settings`], which is handed to each component when it is constructed.

use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_PORT: u16 = 8098;
const DEFAULT_BIND: &str = "0.0.0.0";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Manager settings resolved from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    /// Shared runner configuration file (`config.toml`)
    pub config_path: PathBuf,

    /// Directory holding one `<name>.log` per runner
    pub logs_dir: PathBuf,

    /// Directory holding one `<name>.pid` per runner
    pub pid_dir: PathBuf,

    /// Working directory handed to every runner process
    pub working_dir: PathBuf,

    /// The `gitlab-runner` executable
    pub runner_binary: PathBuf,

    pub bind_address: String,
    pub port: u16,

    /// Web UI assets, if any
    pub static_dir: Option<PathBuf>,

    /// How long `stop` waits for exit before escalating; zero means fire-and-forget
    pub stop_grace: Duration,
}

impl Settings {
    /// Build settings from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let default_base = home.join(".gitlab-runner");

        let config_dir = var("CONFIG_DIR")
            .map(|dir| PathBuf::from(dir.trim_end_matches('/')))
            .unwrap_or_else(|| default_base.clone());

        let data_dir = var("RUNNER_MANAGER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(default_base);

        let working_dir = var("RUNNER_WORKING_DIR")
            .map(PathBuf::from)
            .unwrap_or(home);

        let runner_binary = match var("GITLAB_RUNNER_BIN") {
            Some(path) => PathBuf::from(path),
            None => crate::cli::find_runner_binary().unwrap_or_else(|e| {
                tracing::warn!("{}; falling back to PATH lookup at call time", e);
                PathBuf::from(crate::cli::RUNNER_BINARY_NAME)
            }),
        };

        let port = parse_or_default(var("RUNNER_MANAGER_PORT"), "RUNNER_MANAGER_PORT", DEFAULT_PORT);
        let grace_secs = parse_or_default(var("RUNNER_STOP_GRACE_SECS"), "RUNNER_STOP_GRACE_SECS", 0u64);

        let static_dir = match var("RUNNER_MANAGER_STATIC_DIR") {
            Some(dir) => Some(PathBuf::from(dir)),
            None => {
                let fallback = PathBuf::from("../frontend/static");
                fallback.is_dir().then_some(fallback)
            }
        };

        Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            logs_dir: data_dir.join("logs"),
            pid_dir: data_dir.join("pids"),
            working_dir,
            runner_binary,
            bind_address: var("RUNNER_MANAGER_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port,
            static_dir,
            stop_grace: Duration::from_secs(grace_secs),
        }
    }

    /// Settings rooted entirely under `base`, used by tests and embedded setups
    pub fn rooted_at(base: &Path, runner_binary: impl Into<PathBuf>) -> Self {
        Self {
            config_path: base.join("config").join(CONFIG_FILE_NAME),
            logs_dir: base.join("logs"),
            pid_dir: base.join("pids"),
            working_dir: base.to_path_buf(),
            runner_binary: runner_binary.into(),
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            static_dir: None,
            stop_grace: Duration::ZERO,
        }
    }

    /// Directory containing the runner config file
    pub fn config_dir(&self) -> &Path {
        self.config_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Address string for the HTTP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Create the config, logs and pid directories, warning on failure
    pub fn ensure_directories(&self) {
        for (label, dir) in [
            ("config", self.config_dir()),
            ("logs", self.logs_dir.as_path()),
            ("pids", self.pid_dir.as_path()),
        ] {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!("Failed to create {} directory {:?}: {}", label, dir, e);
            }
        }
    }
}

fn parse_or_default<T>(raw: Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value {:?} for {}, using {}", value, key, default);
            default
        }),
        None => default,
    }
}
