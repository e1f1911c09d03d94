//! Report generator: produces a structured summary from the step records
//! accumulated on an execution context over the course of a run. Invoked
//! by the script harness once a script's body returns, never by the
//! orchestrator — the orchestrator dispatches per-call, it never sees the
//! full run.

use serde::Serialize;
use vpt_core::model::ExecutionContext;

#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub step_number: usize,
    pub success: bool,
    pub message: String,
    pub from_node: Option<String>,
    pub to_node: Option<String>,
    pub screenshot_path: Option<String>,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptReport {
    pub total_steps: usize,
    pub passed_steps: usize,
    pub failed_steps: usize,
    pub execution_time_ms: i64,
    pub screenshot_paths: Vec<String>,
    pub steps: Vec<StepSummary>,
}

/// Reduces `context.step_results` into one structured summary, the way the
/// per-script report step folded recorded steps into a single record
/// before it was persisted alongside the script result.
pub fn generate(context: &ExecutionContext) -> serde_json::Value {
    let passed_steps = context.step_results.iter().filter(|s| s.success).count();
    let total_steps = context.step_results.len();
    let report = ScriptReport {
        total_steps,
        passed_steps,
        failed_steps: total_steps - passed_steps,
        execution_time_ms: (chrono::Utc::now() - context.start_time).num_milliseconds().max(0),
        screenshot_paths: context.screenshot_paths.clone(),
        steps: context
            .step_results
            .iter()
            .enumerate()
            .map(|(index, step)| StepSummary {
                step_number: index + 1,
                success: step.success,
                message: step.message.clone(),
                from_node: step.from_node.as_ref().map(|n| n.as_str().to_string()),
                to_node: step.to_node.as_ref().map(|n| n.as_str().to_string()),
                screenshot_path: step.screenshot_path.clone(),
                execution_time_ms: step.execution_time_ms,
            })
            .collect(),
    };
    serde_json::to_value(report).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpt_core::model::{DeviceId, HostName, StepRecord, TeamId};

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(HostName::new("host1"), DeviceId::new("dev1"), TeamId::new("team1"))
    }

    #[test]
    fn empty_context_reports_zero_steps() {
        let report = generate(&ctx());
        assert_eq!(report["total_steps"], 0);
        assert_eq!(report["passed_steps"], 0);
    }

    #[test]
    fn summarizes_recorded_steps() {
        let mut context = ctx();
        context.record_step(StepRecord {
            success: true,
            screenshot_path: Some("/tmp/step1.png".to_string()),
            message: "ok".to_string(),
            execution_time_ms: 42,
            from_node: Some("home".into()),
            to_node: Some("live".into()),
            actions: Vec::new(),
            retry_actions: Vec::new(),
            failure_actions: Vec::new(),
            verifications: Vec::new(),
            verification_results: Vec::new(),
        });
        context.record_step(StepRecord {
            success: false,
            screenshot_path: None,
            message: "boom".to_string(),
            execution_time_ms: 10,
            from_node: None,
            to_node: None,
            actions: Vec::new(),
            retry_actions: Vec::new(),
            failure_actions: Vec::new(),
            verifications: Vec::new(),
            verification_results: Vec::new(),
        });
        let report = generate(&context);
        assert_eq!(report["total_steps"], 2);
        assert_eq!(report["passed_steps"], 1);
        assert_eq!(report["failed_steps"], 1);
        assert_eq!(report["steps"][0]["step_number"], 1);
        assert_eq!(report["steps"][0]["from_node"], "home");
    }
}
