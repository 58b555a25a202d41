//! GitLab runner configuration parser
//!
//! Reads the shared `config.toml` written by `gitlab-runner register`. The
//! manager never writes this file; it only enumerates the runners in it.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunnerConfig {
    /// Global job concurrency limit
    #[serde(default)]
    pub concurrent: Option<i64>,

    /// Registered runners (`[[runners]]` tables)
    #[serde(default)]
    pub runners: Vec<RunnerEntry>,
}

/// A single `[[runners]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerEntry {
    pub name: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub executor: Option<String>,

    #[serde(default)]
    pub shell: Option<String>,
}

/// Read the runner configuration at `path`
///
/// A missing file is not an error: nothing has been registered yet.
pub fn read_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        tracing::debug!("Runner config not found at {:?}", path);
        return Ok(RunnerConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;

    tracing::debug!("Loaded runner config with {} runners", config.runners.len());

    Ok(config)
}

/// Parse runner configuration text
pub fn parse_config(content: &str) -> Result<RunnerConfig> {
    Ok(toml::from_str(content)?)
}
