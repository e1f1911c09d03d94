//! Runs a single script binary on the host, asynchronously, with an
//! optional callback to the server on completion. Shares the harness
//! campaign executor's subprocess-invocation convention (positional
//! `userinterface_name`, `--host`/`--device`, `--{param}` per parameter)
//! but without the campaign's find-and-link bookkeeping: a directly
//! dispatched script reports its own outcome back to the caller.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vpt_core::model::{HostName, TaskId};
use vpt_exec::tasks::TaskManager;

const SCRIPT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptExecuteRequest {
    pub script_name: String,
    #[serde(default)]
    pub userinterface_name: Option<String>,
    pub device_id: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct TaskCompleteCallback {
    task_id: String,
    result: Option<serde_json::Value>,
    error: Option<String>,
}

/// Spawns the script process in the background and returns immediately;
/// the caller already has `task_id` to poll or to receive the callback
/// under.
pub fn spawn_script(
    tasks: std::sync::Arc<TaskManager>,
    http_client: reqwest::Client,
    scripts_dir: PathBuf,
    host_name: HostName,
    task_id: TaskId,
    request: ScriptExecuteRequest,
) {
    tokio::spawn(async move {
        let script_path = scripts_dir.join(&request.script_name);
        let mut command = tokio::process::Command::new(&script_path);
        if let Some(ui) = &request.userinterface_name {
            command.arg(ui);
        }
        command.arg("--host").arg(host_name.as_str());
        command.arg("--device").arg(&request.device_id);
        for (name, value) in &request.parameters {
            command.arg(format!("--{name}")).arg(value.to_string());
        }
        command.kill_on_drop(true);

        let outcome = tokio::time::timeout(SCRIPT_TIMEOUT, command.status()).await;
        let (result, error) = match outcome {
            Ok(Ok(status)) if status.success() => (
                Some(serde_json::json!({ "script_name": request.script_name, "success": true })),
                None,
            ),
            Ok(Ok(status)) => (None, Some(format!("script exited with status {status}"))),
            Ok(Err(e)) => (None, Some(format!("failed to spawn script: {e}"))),
            Err(_) => (None, Some("script execution timed out".to_string())),
        };

        tasks.complete_task(&task_id, result.clone(), error.clone());

        if let Some(callback_url) = &request.callback_url {
            let payload = TaskCompleteCallback {
                task_id: task_id.as_str().to_string(),
                result,
                error,
            };
            if let Err(e) = http_client.post(callback_url).json(&payload).send().await {
                tracing::warn!(error = %e, callback_url, "script completion callback failed");
            }
        }
    });
}
