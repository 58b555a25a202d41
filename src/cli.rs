//! `gitlab-runner` command-line integration
//!
//! Registration and unregistration shell out to the runner tool and hand its
//! combined output back to the caller.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::settings::Settings;
use crate::{Error, Result};

pub const RUNNER_BINARY_NAME: &str = "gitlab-runner";

/// Find the gitlab-runner binary in PATH or common locations
pub fn find_runner_binary() -> Result<PathBuf> {
    if let Ok(path) = which::which(RUNNER_BINARY_NAME) {
        return Ok(path);
    }

    let mut candidates = vec![
        PathBuf::from("/usr/local/bin/gitlab-runner"),
        PathBuf::from("/usr/bin/gitlab-runner"),
        PathBuf::from("/opt/homebrew/bin/gitlab-runner"),
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".local/bin/gitlab-runner"));
    }

    candidates
        .into_iter()
        .find(|path| path.exists())
        .ok_or_else(|| {
            Error::BinaryNotFound(format!("{} is not installed or not in PATH", RUNNER_BINARY_NAME))
        })
}

/// Invokes `gitlab-runner register` / `unregister` against the shared config
#[derive(Debug, Clone)]
pub struct RunnerCli {
    binary: PathBuf,
    config_path: PathBuf,
}

impl RunnerCli {
    pub fn new(settings: &Settings) -> Self {
        Self {
            binary: settings.runner_binary.clone(),
            config_path: settings.config_path.clone(),
        }
    }

    pub fn register_args(&self, name: &str, url: &str, token: &str) -> Vec<OsString> {
        vec![
            "register".into(),
            "--non-interactive".into(),
            "--url".into(),
            url.into(),
            "--token".into(),
            token.into(),
            "--name".into(),
            name.into(),
            "--config".into(),
            self.config_path.clone().into_os_string(),
            "--executor".into(),
            "shell".into(),
        ]
    }

    pub fn unregister_args(&self, token: &str) -> Vec<OsString> {
        vec![
            "unregister".into(),
            "--config".into(),
            self.config_path.clone().into_os_string(),
            "--token".into(),
            token.into(),
        ]
    }

    /// Register a runner; returns the tool's combined output
    pub async fn register(&self, name: &str, url: &str, token: &str) -> Result<String> {
        self.run(
            self.register_args(name, url, token),
            "Failed to register runner, please check the token and url",
        )
        .await
    }

    /// Unregister the runner owning `token`; returns the tool's combined output
    pub async fn unregister(&self, token: &str) -> Result<String> {
        self.run(self.unregister_args(token), "Failed to unregister runner")
            .await
    }

    async fn run(&self, args: Vec<OsString>, failure: &str) -> Result<String> {
        let output = tokio::process::Command::new(&self.binary)
            .args(&args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| Error::ExternalTool {
                message: failure.to_string(),
                output: format!("{}: {}", self.binary.display(), e),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            tracing::error!("{} ({}), output: {}", failure, output.status, combined);
            return Err(Error::ExternalTool {
                message: failure.to_string(),
                output: combined,
            });
        }

        Ok(combined)
    }
}
