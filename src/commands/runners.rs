//! Runner management commands

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config_store;
use crate::state::AppState;
use crate::supervisor::RunnerState;
use crate::utils::validate_runner_name;
use crate::{Error, Result};

/// Register request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
}

/// Delete request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub token: String,
}

/// Restart request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestartRequest {
    #[serde(default)]
    pub name: String,
}

/// Generic success response
#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl OperationResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            output: None,
        }
    }
}

/// A configured runner with its live status
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerInfo {
    pub name: String,
    pub url: String,
    pub token: String,
    pub status: RunnerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

/// Logs response
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub success: bool,
    pub name: String,
    pub logs: String,
}

/// Register a new runner with the runner tool
pub async fn register_runner(state: &AppState, req: RegisterRequest) -> Result<OperationResponse> {
    if req.name.trim().is_empty() || req.url.trim().is_empty() || req.token.trim().is_empty() {
        return Err(Error::Validation("Name, URL and Token are required".to_string()));
    }
    let name = validate_runner_name(&req.name)?;

    let output = state
        .cli
        .register(name, &req.url, &req.token)
        .await?;

    tracing::info!("Runner registered successfully: {}", name);

    Ok(OperationResponse {
        success: true,
        message: "Runner registered successfully".to_string(),
        output: Some(output),
    })
}

/// List runners from the shared config with their live status
pub async fn list_runners(state: &AppState) -> Result<Vec<RunnerInfo>> {
    let config = config_store::read_config(&state.settings.config_path)?;

    let mut runners = Vec::with_capacity(config.runners.len());
    for entry in config.runners {
        let status = state.manager.status(&entry.name).await;
        runners.push(RunnerInfo {
            name: entry.name,
            url: entry.url,
            token: entry.token,
            status: status.state,
            pid: status.pid,
            started_at: status.started_at,
        });
    }

    Ok(runners)
}

/// Stop a runner (best effort) and unregister it
pub async fn delete_runner(state: &AppState, req: DeleteRequest) -> Result<OperationResponse> {
    let token = req.token.trim();
    if token.is_empty() {
        return Err(Error::Validation("Token is required".to_string()));
    }

    if !req.name.trim().is_empty() {
        if let Err(e) = state.manager.stop(&req.name).await {
            tracing::warn!("Warning: failed to stop runner {}: {}", req.name, e);
        }
    }

    state.cli.unregister(token).await?;
    tracing::info!("Runner unregistered successfully: {}", req.name.trim());

    Ok(OperationResponse::ok("Runner unregistered successfully"))
}

/// Stop and start a runner; only the start outcome is reported
pub async fn restart_runner(state: &AppState, req: RestartRequest) -> Result<OperationResponse> {
    let name = validate_runner_name(&req.name)?;

    state.restart_runner(name).await.map_err(|e| {
        tracing::error!("Error starting runner {}: {}", name, e);
        e
    })?;

    Ok(OperationResponse::ok(format!(
        "Runner {} restarted successfully",
        name
    )))
}

/// Tail of the latest log for a runner
///
/// Read failures are reported inside `logs` rather than as a failed request.
pub async fn runner_logs(state: &AppState, name: Option<String>) -> Result<LogsResponse> {
    let name = name.unwrap_or_default();
    let name = validate_runner_name(&name)?.to_string();

    let logs = match state.manager.logs(&name).await {
        Ok(text) => text,
        Err(e) => format!("Error reading logs for runner {}: {}", name, e),
    };

    Ok(LogsResponse {
        success: true,
        name,
        logs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::supervisor::fake::FakeSupervisor;
    use crate::supervisor::NO_LOGS_PLACEHOLDER;
    use std::path::Path;
    use std::sync::Arc;

    fn state_in(dir: &Path, tool: &Path) -> (AppState, Arc<FakeSupervisor>) {
        let settings = Settings::rooted_at(dir, tool);
        let supervisor = Arc::new(FakeSupervisor::default());
        (AppState::with_supervisor(settings, supervisor.clone()), supervisor)
    }

    fn write_config(state: &AppState, body: &str) {
        std::fs::create_dir_all(state.settings.config_dir()).unwrap();
        std::fs::write(&state.settings.config_path, body).unwrap();
    }

    #[tokio::test]
    async fn test_register_requires_fields() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state_in(dir.path(), Path::new("/bin/false"));

        let req = RegisterRequest {
            name: "build-1".to_string(),
            url: String::new(),
            token: "glrt-abc".to_string(),
        };
        let err = register_runner(&state, req).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "Name, URL and Token are required");
    }

    #[tokio::test]
    async fn test_list_runners_without_config() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state_in(dir.path(), Path::new("/bin/false"));
        assert!(list_runners(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_runners_with_status() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state_in(dir.path(), Path::new("/bin/false"));
        write_config(
            &state,
            r#"
concurrent = 1

[[runners]]
  name = "build-1"
  url = "https://gitlab.example.com"
  token = "glrt-abc"
  executor = "shell"

[[runners]]
  name = "build-2"
  url = "https://gitlab.example.com"
  token = "glrt-def"
  executor = "shell"
"#,
        );

        let identity = state.manager.start("build-1").await.unwrap();

        let runners = list_runners(&state).await.unwrap();
        assert_eq!(runners.len(), 2);
        assert_eq!(runners[0].name, "build-1");
        assert_eq!(runners[0].status, RunnerState::Running);
        assert_eq!(runners[0].pid, Some(identity.pid));
        assert_eq!(runners[1].status, RunnerState::Stopped);
        assert_eq!(runners[1].pid, None);

        let json = serde_json::to_value(&runners[1]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "build-2",
                "url": "https://gitlab.example.com",
                "token": "glrt-def",
                "status": "stopped",
            })
        );
    }

    #[tokio::test]
    async fn test_restart_never_started_runner() {
        let dir = tempfile::tempdir().unwrap();
        let (state, supervisor) = state_in(dir.path(), Path::new("/bin/false"));

        let response = restart_runner(
            &state,
            RestartRequest {
                name: "build-1".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(response.success);
        assert_eq!(response.message, "Runner build-1 restarted successfully");
        assert_eq!(state.manager.probe("build-1").await, RunnerState::Running);
        assert!(supervisor.signals.lock().is_empty());
    }

    #[tokio::test]
    async fn test_restart_running_runner_replaces_process() {
        let dir = tempfile::tempdir().unwrap();
        let (state, supervisor) = state_in(dir.path(), Path::new("/bin/false"));

        let first = state.manager.start("build-1").await.unwrap();
        restart_runner(
            &state,
            RestartRequest {
                name: "build-1".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(!supervisor.is_running(first.pid));
        let record = state.manager.pid_store().read("build-1").unwrap().unwrap();
        assert_ne!(record.pid, first.pid);
        assert!(supervisor.is_running(record.pid));
    }

    #[tokio::test]
    async fn test_restart_start_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (state, supervisor) = state_in(dir.path(), Path::new("/bin/false"));
        *supervisor.fail_spawn.lock() = true;

        let err = restart_runner(
            &state,
            RestartRequest {
                name: "build-1".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Spawn(_)));
    }

    #[tokio::test]
    async fn test_logs_never_started() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state_in(dir.path(), Path::new("/bin/false"));

        let response = runner_logs(&state, Some("build-1".to_string())).await.unwrap();
        assert!(response.success);
        assert_eq!(response.name, "build-1");
        assert_eq!(response.logs, NO_LOGS_PLACEHOLDER);

        assert!(matches!(
            runner_logs(&state, None).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_token() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state_in(dir.path(), Path::new("/bin/false"));

        let err = delete_runner(
            &state,
            DeleteRequest {
                name: "build-1".to_string(),
                token: " ".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Token is required");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_register_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let tool = crate::cli::tests::fake_tool(dir.path(), "echo \"Registering runner... $*\"");
        let (state, _) = state_in(dir.path(), &tool);

        let response = register_runner(
            &state,
            RegisterRequest {
                name: "build-1".to_string(),
                url: "https://gitlab.example.com".to_string(),
                token: "glrt-abc".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(response.success);
        let output = response.output.unwrap();
        assert!(output.contains("--url https://gitlab.example.com"));
        assert!(output.contains("--token glrt-abc"));
        assert!(output.contains("--name build-1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_register_forwards_url_and_token_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let tool = crate::cli::tests::fake_tool(dir.path(), "printf '[%s]' \"$@\"");
        let (state, _) = state_in(dir.path(), &tool);

        let response = register_runner(
            &state,
            RegisterRequest {
                name: "build-1".to_string(),
                url: " https://gitlab.example.com ".to_string(),
                token: "glrt-abc\t".to_string(),
            },
        )
        .await
        .unwrap();

        let output = response.output.unwrap();
        assert!(output.contains("[--url][ https://gitlab.example.com ]"));
        assert!(output.contains("[--token][glrt-abc\t]"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_delete_stops_then_unregisters() {
        let dir = tempfile::tempdir().unwrap();
        let tool = crate::cli::tests::fake_tool(dir.path(), "echo \"$*\"");
        let (state, supervisor) = state_in(dir.path(), &tool);

        let identity = state.manager.start("build-1").await.unwrap();
        let response = delete_runner(
            &state,
            DeleteRequest {
                name: "build-1".to_string(),
                token: "glrt-abc".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(response.message, "Runner unregistered successfully");
        assert!(!supervisor.is_running(identity.pid));
        assert_eq!(state.manager.probe("build-1").await, RunnerState::Stopped);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_delete_proceeds_when_stop_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tool = crate::cli::tests::fake_tool(dir.path(), "echo unregistered");
        let (state, _) = state_in(dir.path(), &tool);

        let response = delete_runner(
            &state,
            DeleteRequest {
                name: "never-started".to_string(),
                token: "glrt-abc".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(response.success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_delete_unregister_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tool = crate::cli::tests::fake_tool(dir.path(), "echo 'runner not found' >&2\nexit 1");
        let (state, _) = state_in(dir.path(), &tool);

        let err = delete_runner(
            &state,
            DeleteRequest {
                name: String::new(),
                token: "glrt-abc".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.tool_output(), Some("runner not found\n"));
    }
}
