//! Action executor: runs an ordered action list against a controller,
//! with retry and failure fallback, recording every single-action outcome
//! to the store synchronously so the persisted record never lies about an
//! execution having happened.

use serde::{Deserialize, Serialize};
use vpt_core::model::{Action, EdgeId, ExecutionContext, NodeId, ResultType, StepRecord};
use vpt_controller::ControllerRegistry;
use vpt_store::{EdgeExecutionRecord, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Main,
    Retry,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStepResult {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
    pub result_type: ResultType,
    pub execution_time_ms: u64,
    pub action_category: ActionCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionBatchResult {
    pub success: bool,
    pub total_count: usize,
    pub passed_count: usize,
    /// `total_count as i64 - passed_count`, reported raw and uncapped: a
    /// retry/failure batch that re-passes more actions than were in the
    /// original valid set can drive this negative.
    pub failed_count: i64,
    pub results: Vec<ActionStepResult>,
    pub message: String,
    pub error: Option<String>,
}

impl ActionBatchResult {
    fn empty_success(message: &str) -> Self {
        Self {
            success: true,
            total_count: 0,
            passed_count: 0,
            failed_count: 0,
            results: Vec::new(),
            message: message.to_string(),
            error: None,
        }
    }

    fn all_invalid() -> Self {
        Self {
            success: false,
            total_count: 0,
            passed_count: 0,
            failed_count: 0,
            results: Vec::new(),
            message: "All actions were invalid and filtered out".to_string(),
            error: Some("All actions were invalid and filtered out".to_string()),
        }
    }
}

fn filter_valid(actions: &[Action]) -> Vec<&Action> {
    actions.iter().filter(|a| a.is_valid()).collect()
}

async fn execute_single(
    store: &dyn Store,
    controllers: &ControllerRegistry,
    action: &Action,
    edge_id: Option<&EdgeId>,
    category: ActionCategory,
    context: &ExecutionContext,
) -> ActionStepResult {
    let start = std::time::Instant::now();

    let outcome = match controllers.get(&action.device_model) {
        Some(controller) => controller
            .execute_command(&action.command, &serde_json::json!(action.params))
            .await
            .map(|r| (r.success, r.message, r.error)),
        None => Err(vpt_core::Error::controller(format!(
            "no controller registered for device model: {}",
            action.device_model
        ))),
    };

    let execution_time_ms = start.elapsed().as_millis() as u64;
    let label = action.label.clone().unwrap_or_else(|| action.command.clone());

    let (success, message, error) = match outcome {
        Ok((success, message, error)) => (success, message.unwrap_or_else(|| label.clone()), error),
        Err(e) => (false, label.clone(), Some(e.to_string())),
    };

    if let Some(edge_id) = edge_id {
        let _ = store
            .record_edge_execution(EdgeExecutionRecord {
                team_id: context.team_id.clone(),
                tree_id: context.tree_id.clone().unwrap_or_else(|| "".into()),
                edge_id: edge_id.clone(),
                host_name: context.host.clone(),
                device_model: action.device_model.clone(),
                success,
                execution_time_ms,
                message: Some(message.clone()),
                error_details: error.as_ref().map(|e| serde_json::json!({ "error": e })),
                script_result_id: context.script_result_id.clone(),
                script_context: context.script_context.clone(),
                recorded_at: chrono::Utc::now(),
            })
            .await;
    }

    ActionStepResult {
        success,
        message,
        error,
        result_type: ResultType::from_success(success),
        execution_time_ms,
        action_category: category,
    }
}

/// Runs `actions` (main list), then `retry_actions` in full if any main
/// action failed, then `failure_actions` diagnostically if the batch is
/// still unsuccessful after retry. `edge_id` threads through so every
/// single-action outcome is recorded per edge; pass `None` for ad hoc
/// (non-navigation) action calls. `from_node`/`to_node` are likewise only
/// known by navigation-driven callers and are `None` for ad hoc calls;
/// they flow straight into the step record this appends to `context`.
#[allow(clippy::too_many_arguments)]
pub async fn execute_actions(
    store: &dyn Store,
    controllers: &ControllerRegistry,
    actions: &[Action],
    retry_actions: &[Action],
    failure_actions: &[Action],
    edge_id: Option<&EdgeId>,
    from_node: Option<&NodeId>,
    to_node: Option<&NodeId>,
    context: &mut ExecutionContext,
) -> ActionBatchResult {
    if actions.is_empty() {
        return ActionBatchResult::empty_success("No actions to execute");
    }

    let valid_actions = filter_valid(actions);
    if valid_actions.is_empty() {
        return ActionBatchResult::all_invalid();
    }
    let valid_retry_actions = filter_valid(retry_actions);
    let valid_failure_actions = filter_valid(failure_actions);

    let mut results = Vec::new();
    let mut passed_count = 0usize;

    for action in &valid_actions {
        let result = execute_single(
            store,
            controllers,
            action,
            edge_id,
            ActionCategory::Main,
            &*context,
        )
        .await;
        if result.success {
            passed_count += 1;
        }
        results.push(result);
    }

    let main_failed = passed_count < valid_actions.len();
    if main_failed && !valid_retry_actions.is_empty() {
        for action in &valid_retry_actions {
            let result = execute_single(
                store,
                controllers,
                action,
                edge_id,
                ActionCategory::Retry,
                &*context,
            )
            .await;
            if result.success {
                passed_count += 1;
            }
            results.push(result);
        }
    }

    let total_count = valid_actions.len();
    let overall_success = passed_count >= total_count;

    if !overall_success && !valid_failure_actions.is_empty() {
        for action in &valid_failure_actions {
            let result = execute_single(
                store,
                controllers,
                action,
                edge_id,
                ActionCategory::Failure,
                &*context,
            )
            .await;
            results.push(result);
        }
    }

    let message = format!("Batch action execution completed: {passed_count}/{total_count} passed");
    context.record_step(StepRecord {
        success: overall_success,
        screenshot_path: None,
        message: message.clone(),
        execution_time_ms: results.iter().map(|r| r.execution_time_ms).sum(),
        from_node: from_node.cloned(),
        to_node: to_node.cloned(),
        actions: valid_actions.iter().map(|a| (*a).clone()).collect(),
        retry_actions: valid_retry_actions.iter().map(|a| (*a).clone()).collect(),
        failure_actions: valid_failure_actions.iter().map(|a| (*a).clone()).collect(),
        verifications: Vec::new(),
        verification_results: Vec::new(),
    });

    ActionBatchResult {
        success: overall_success,
        total_count,
        passed_count,
        failed_count: total_count as i64 - passed_count as i64,
        message,
        error: None,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vpt_core::model::{ActionId, ActionType, DeviceId, HostName, TeamId};
    use vpt_controller::local::LocalController;
    use vpt_store::memory::InMemoryStore;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(HostName::new("host1"), DeviceId::new("dev1"), TeamId::new("team1"))
    }

    fn action(command: &str, force_fail: bool) -> Action {
        let mut params = std::collections::HashMap::new();
        if force_fail {
            params.insert("force_fail".to_string(), serde_json::json!(true));
        }
        params.insert("wait_time".to_string(), serde_json::json!(500));
        Action {
            id: ActionId::new_uuid(),
            device_model: "mock".into(),
            action_type: ActionType::Remote,
            command: command.into(),
            params,
            requires_input: false,
            label: None,
        }
    }

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry.register(Arc::new(LocalController::new("mock")));
        registry
    }

    #[tokio::test]
    async fn empty_actions_succeed_trivially() {
        let store = InMemoryStore::new();
        let mut context = ctx();
        let result = execute_actions(&store, &registry(), &[], &[], &[], None, None, None, &mut context).await;
        assert!(result.success);
        assert_eq!(result.total_count, 0);
        assert!(context.step_results.is_empty());
    }

    #[tokio::test]
    async fn all_invalid_actions_fail_the_batch() {
        let store = InMemoryStore::new();
        let invalid = Action {
            command: "".into(),
            ..action("press_key", false)
        };
        let mut context = ctx();
        let result = execute_actions(&store, &registry(), &[invalid], &[], &[], None, None, None, &mut context).await;
        assert!(!result.success);
        assert_eq!(result.total_count, 0);
    }

    #[tokio::test]
    async fn main_success_skips_retry_and_failure() {
        let store = InMemoryStore::new();
        let mut context = ctx();
        let result = execute_actions(
            &store,
            &registry(),
            &[action("press_key", false)],
            &[action("press_key", false)],
            &[action("press_key", false)],
            None,
            None,
            None,
            &mut context,
        )
        .await;
        assert!(result.success);
        assert_eq!(result.results.len(), 1);
        assert_eq!(context.step_results.len(), 1);
        assert!(context.step_results[0].success);
    }

    #[tokio::test]
    async fn retry_recovers_from_main_failure() {
        let store = InMemoryStore::new();
        let mut context = ctx();
        let result = execute_actions(
            &store,
            &registry(),
            &[action("press_key", true)],
            &[action("press_key", false)],
            &[],
            None,
            None,
            None,
            &mut context,
        )
        .await;
        assert!(result.success);
        assert_eq!(result.results.len(), 2);
        assert!(!result.results[0].success);
        assert!(result.results[1].success);
    }

    #[tokio::test]
    async fn failure_actions_run_diagnostically_without_flipping_success() {
        let store = InMemoryStore::new();
        let mut context = ctx();
        let result = execute_actions(
            &store,
            &registry(),
            &[action("press_key", true)],
            &[action("press_key", true)],
            &[action("diagnose", false)],
            None,
            None,
            None,
            &mut context,
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.results.len(), 3);
        assert!(result.results[2].success);
    }

    #[tokio::test]
    async fn requires_input_without_value_is_filtered_out() {
        let store = InMemoryStore::new();
        let mut needs_input = action("type_text", false);
        needs_input.requires_input = true;
        let mut context = ctx();
        let result =
            execute_actions(&store, &registry(), &[needs_input], &[], &[], None, None, None, &mut context).await;
        assert!(!result.success);
        assert_eq!(result.total_count, 0);
    }

    #[tokio::test]
    async fn a_step_that_reruns_more_retries_than_the_valid_total_reports_negative_failed_count() {
        let store = InMemoryStore::new();
        let mut context = ctx();
        let result = execute_actions(
            &store,
            &registry(),
            &[action("press_key", true)],
            &[action("press_key", false), action("press_key", false)],
            &[],
            None,
            None,
            None,
            &mut context,
        )
        .await;
        assert_eq!(result.total_count, 1);
        assert_eq!(result.passed_count, 2);
        assert_eq!(result.failed_count, -1);
    }
}
