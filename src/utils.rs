//! Utility functions for runner-manager

use crate::Result;

/// Longest runner name accepted as a file stem
const MAX_NAME_LEN: usize = 128;

/// Validate a runner name before it is used to build PID and log file paths
///
/// Runner names end up as `<dir>/<name>.pid` and `<dir>/<name>.log`, so anything
/// that could escape the directory (separators, `..`, NUL) is rejected.
pub fn validate_runner_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(crate::Error::Validation("Runner name is required".to_string()));
    }

    if trimmed.len() > MAX_NAME_LEN {
        return Err(crate::Error::Validation(format!(
            "Runner name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }

    if trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\', '\0'])
        || trimmed.starts_with('.')
    {
        return Err(crate::Error::Validation(format!(
            "Invalid runner name: {}",
            name
        )));
    }

    Ok(trimmed)
}
