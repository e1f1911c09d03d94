//! Execution orchestrator: the single surface the HTTP layer calls
//! through. A pure dispatcher over the four executors — it holds no
//! state of its own beyond the registries/caches it's handed, wraps each
//! call with isolated log capture, and folds the executor-specific result
//! into one envelope shape so every route handler serializes the same way.

use serde::{Deserialize, Serialize};
use vpt_blocks::registry::BlockRegistry;
use vpt_controller::ControllerRegistry;
use vpt_core::model::{Action, ExecutionContext, Verification};
use vpt_graph::NavigationGraphCache;
use vpt_store::Store;

use crate::actions::{self, ActionBatchResult};
use crate::logging::execute_with_logging;
use crate::navigation::{self, NavigationRequest, NavigationResult};
use crate::verifications::{self, PassCondition, VerificationBatchResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub logs: String,
    #[serde(flatten)]
    pub result: T,
}

pub async fn execute_navigation(
    store: &dyn Store,
    controllers: &ControllerRegistry,
    graph_cache: &NavigationGraphCache,
    request: NavigationRequest,
    context: &mut ExecutionContext,
) -> Envelope<NavigationResult> {
    let (result, logs) =
        execute_with_logging(navigation::execute_navigation(store, controllers, graph_cache, request, context))
            .await;
    Envelope {
        success: result.success,
        logs,
        result,
    }
}

pub async fn execute_actions(
    store: &dyn Store,
    controllers: &ControllerRegistry,
    actions: &[Action],
    context: &mut ExecutionContext,
) -> Envelope<ActionBatchResult> {
    let (result, logs) = execute_with_logging(actions::execute_actions(
        store,
        controllers,
        actions,
        &[],
        &[],
        None,
        None,
        None,
        context,
    ))
    .await;
    Envelope {
        success: result.success,
        logs,
        result,
    }
}

pub async fn execute_verifications(
    store: &dyn Store,
    controllers: &ControllerRegistry,
    verifications: &[Verification],
    pass_condition: PassCondition,
    context: &mut ExecutionContext,
) -> Envelope<VerificationBatchResult> {
    let (result, logs) = execute_with_logging(verifications::execute_verifications(
        store,
        controllers,
        verifications,
        None,
        None,
        pass_condition,
        context,
    ))
    .await;
    Envelope {
        success: result.success,
        logs,
        result,
    }
}

pub async fn execute_blocks(
    blocks: &BlockRegistry,
    command: &str,
    params: &serde_json::Value,
    context: &ExecutionContext,
) -> Envelope<vpt_blocks::registry::BlockResult> {
    let (result, logs) = execute_with_logging(blocks.execute(command, params, context)).await;
    Envelope {
        success: result.success,
        logs,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vpt_controller::local::LocalController;
    use vpt_core::model::{Action, ActionId, ActionType, DeviceId, HostName, TeamId};
    use vpt_store::memory::InMemoryStore;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(HostName::new("host1"), DeviceId::new("dev1"), TeamId::new("team1"))
    }

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry.register(Arc::new(LocalController::new("mock")));
        registry
    }

    #[tokio::test]
    async fn action_envelope_captures_logs_and_success() {
        let store = InMemoryStore::new();
        let action = Action {
            id: ActionId::new_uuid(),
            device_model: "mock".into(),
            action_type: ActionType::Remote,
            command: "press_key".into(),
            params: std::collections::HashMap::new(),
            requires_input: false,
            label: None,
        };
        let envelope = execute_actions(&store, &registry(), &[action], &mut ctx()).await;
        assert!(envelope.success);
        assert_eq!(envelope.result.total_count, 1);
    }

    #[tokio::test]
    async fn unknown_block_command_reports_failure_envelope() {
        let blocks = BlockRegistry::new();
        let envelope = execute_blocks(&blocks, "nope", &serde_json::json!({}), &ctx()).await;
        assert!(!envelope.success);
    }
}
