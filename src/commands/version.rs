//! Build metadata

use serde::Serialize;

/// Version information, filled in at compile time when the build provides it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: &'static str,
    pub git_commit: &'static str,
    pub git_commit_full: &'static str,
    pub git_branch: &'static str,
    pub build_time: &'static str,
}

pub fn get_version() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_commit: option_env!("RUNNER_MANAGER_GIT_COMMIT").unwrap_or("unknown"),
        git_commit_full: option_env!("RUNNER_MANAGER_GIT_COMMIT_FULL").unwrap_or("unknown"),
        git_branch: option_env!("RUNNER_MANAGER_GIT_BRANCH").unwrap_or("unknown"),
        build_time: option_env!("RUNNER_MANAGER_BUILD_TIME").unwrap_or("unknown"),
    }
}
