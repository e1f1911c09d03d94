//! Campaign executor: runs a sequence of script executions, each as a
//! separate process, and links each child's script result to the parent
//! campaign record. Grounded directly on the original campaign runner's
//! control flow — record start, loop scripts in order, find-and-link by
//! a ±30s time window, honor `continue_on_failure`, aggregate success —
//! re-expressed with `tokio::process::Command` standing in for
//! `subprocess.run` and a `tokio::time::timeout` standing in for its
//! fixed subprocess timeout.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use vpt_core::model::{
    CampaignConfiguration, CampaignExecution, CampaignExecutionId, CampaignStatus, TeamId,
};
use vpt_core::{Error, Result};
use vpt_store::Store;

/// Per-script timeout applied when the campaign's own `timeout_minutes`
/// doesn't override it.
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Window around a script's measured run time within which its recorded
/// result is considered "the one this script produced".
const LINK_WINDOW: chrono::Duration = chrono::Duration::seconds(30);

#[derive(Debug, Clone)]
pub struct ScriptExecutionOutcome {
    pub script_name: String,
    pub success: bool,
    pub execution_time_ms: u64,
    pub script_result_id: Option<vpt_core::model::ScriptResultId>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CampaignResult {
    pub campaign_execution_id: CampaignExecutionId,
    pub success: bool,
    pub total_scripts: u32,
    pub successful_scripts: u32,
    pub failed_scripts: u32,
    pub execution_time_ms: u64,
    pub script_executions: Vec<ScriptExecutionOutcome>,
    pub error: Option<String>,
}

pub struct CampaignExecutor {
    /// Directory each `script_name` is resolved against — the harness
    /// produces a standalone binary per script rather than an
    /// interpreter + source file pair.
    scripts_dir: PathBuf,
}

impl CampaignExecutor {
    pub fn new(scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
        }
    }

    pub async fn execute_campaign(
        &self,
        store: &dyn Store,
        team_id: &TeamId,
        config: CampaignConfiguration,
        executed_by: Option<String>,
    ) -> CampaignResult {
        let started = std::time::Instant::now();

        if config.scripts.is_empty() {
            return CampaignResult {
                campaign_execution_id: CampaignExecutionId::new_uuid(),
                success: false,
                total_scripts: 0,
                successful_scripts: 0,
                failed_scripts: 0,
                execution_time_ms: 0,
                script_executions: Vec::new(),
                error: Some("No scripts configured for execution".to_string()),
            };
        }

        let campaign_execution_id = match store
            .create_campaign_execution(
                team_id,
                &config.campaign_name,
                &config.userinterface_name,
                &config.host_name,
                &config.device_name,
                config.scripts.clone(),
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                return CampaignResult {
                    campaign_execution_id: CampaignExecutionId::new_uuid(),
                    success: false,
                    total_scripts: config.scripts.len() as u32,
                    successful_scripts: 0,
                    failed_scripts: 0,
                    execution_time_ms: started.elapsed().as_millis() as u64,
                    script_executions: Vec::new(),
                    error: Some(format!("failed to record campaign start: {e}")),
                }
            }
        };
        let _ = executed_by;

        let timeout = if config.policy.timeout_minutes > 0 {
            Duration::from_secs(config.policy.timeout_minutes * 60)
        } else {
            DEFAULT_SCRIPT_TIMEOUT
        };

        let mut outcomes = Vec::with_capacity(config.scripts.len());
        let mut successful = 0u32;
        let mut failed = 0u32;
        let mut stopped_early = false;

        for script_config in &config.scripts {
            let outcome = self
                .execute_single_script(store, team_id, &config, script_config, timeout, campaign_execution_id.clone())
                .await;

            if outcome.success {
                successful += 1;
            } else {
                failed += 1;
            }
            let keep_going = outcome.success || config.policy.continue_on_failure;
            outcomes.push(outcome);
            if !keep_going {
                stopped_early = true;
                break;
            }
        }

        let total_scripts = config.scripts.len() as u32;
        let completed_scripts = outcomes.len() as u32;
        let overall_success = !stopped_early && completed_scripts == total_scripts && failed == 0;
        let status = if overall_success {
            CampaignStatus::Completed
        } else {
            CampaignStatus::Failed
        };

        if let Err(e) = store
            .complete_campaign_execution(&campaign_execution_id, status, successful, failed, overall_success)
            .await
        {
            tracing::error!(error = %e, "failed to persist campaign completion");
        }

        CampaignResult {
            campaign_execution_id,
            success: overall_success,
            total_scripts,
            successful_scripts: successful,
            failed_scripts: failed,
            execution_time_ms: started.elapsed().as_millis() as u64,
            script_executions: outcomes,
            error: None,
        }
    }

    async fn execute_single_script(
        &self,
        store: &dyn Store,
        team_id: &TeamId,
        config: &CampaignConfiguration,
        script_config: &vpt_core::model::ScriptConfiguration,
        timeout: Duration,
        campaign_execution_id: CampaignExecutionId,
    ) -> ScriptExecutionOutcome {
        let script_path = self.scripts_dir.join(&script_config.script_name);
        let start = Utc::now();
        let started = std::time::Instant::now();

        let run_result = self
            .spawn_and_wait(&script_path, config, script_config, timeout)
            .await;

        let execution_time_ms = started.elapsed().as_millis() as u64;

        let (success, error) = match &run_result {
            Ok(status) if status.success() => (true, None),
            Ok(status) => (false, Some(format!("script exited with status {status}"))),
            Err(e) => (false, Some(e.to_string())),
        };

        let script_result_id = self
            .find_and_link_script_result(
                store,
                team_id,
                &config.host_name,
                &script_config.script_name,
                start,
                execution_time_ms,
                &campaign_execution_id,
            )
            .await;

        let error = if script_result_id.is_none() && error.is_none() {
            Some("no script result found to link within the time window".to_string())
        } else {
            error
        };

        ScriptExecutionOutcome {
            script_name: script_config.script_name.clone(),
            success: success && script_result_id.is_some(),
            execution_time_ms,
            script_result_id,
            error,
        }
    }

    async fn spawn_and_wait(
        &self,
        script_path: &std::path::Path,
        config: &CampaignConfiguration,
        script_config: &vpt_core::model::ScriptConfiguration,
        timeout: Duration,
    ) -> Result<std::process::ExitStatus> {
        let mut command = tokio::process::Command::new(script_path);
        command.arg(&config.userinterface_name);
        command.arg("--host").arg(config.host_name.as_str());
        command.arg("--device").arg(config.device_name.as_str());
        for (name, value) in &script_config.parameters {
            command.arg(format!("--{name}")).arg(value.to_string());
        }
        command.kill_on_drop(true);

        match tokio::time::timeout(timeout, command.status()).await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(e)) => Err(Error::fatal(format!("failed to spawn script: {e}"))),
            Err(_) => Err(Error::fatal("script execution timed out")),
        }
    }

    async fn find_and_link_script_result(
        &self,
        store: &dyn Store,
        team_id: &TeamId,
        host_name: &vpt_core::model::HostName,
        script_name: &str,
        start: chrono::DateTime<Utc>,
        execution_time_ms: u64,
        campaign_execution_id: &CampaignExecutionId,
    ) -> Option<vpt_core::model::ScriptResultId> {
        let window_start = start - LINK_WINDOW;
        let window_end = start + chrono::Duration::milliseconds(execution_time_ms as i64) + LINK_WINDOW;

        let found = store
            .find_script_result_in_window(team_id, script_name, host_name, window_start, window_end)
            .await
            .ok()
            .flatten();

        if let Some(script_result_id) = &found {
            if let Err(e) = store
                .append_campaign_script_result(campaign_execution_id, script_result_id)
                .await
            {
                tracing::warn!(error = %e, "failed to link script result to campaign");
            }
        }
        found
    }

    pub async fn get_campaign_execution(
        &self,
        store: &dyn Store,
        campaign_execution_id: &CampaignExecutionId,
    ) -> Result<Option<CampaignExecution>> {
        store.get_campaign_execution(campaign_execution_id).await
    }
}
