//! Navigation executor: resolves a path via the pathfinder, drives the
//! action executor per transition with retry/failure fallback, and
//! verifies at the target node.

use serde::{Deserialize, Serialize};
use vpt_controller::ControllerRegistry;
use vpt_core::model::{ExecutionContext, NodeId, TeamId, Transition};
use vpt_graph::pathfind;
use vpt_graph::NavigationGraphCache;
use vpt_store::Store;

use crate::actions;
use crate::screenshots;
use crate::verifications::{self, PassCondition, VerificationBatchResult};

#[derive(Debug, Clone)]
pub struct NavigationRequest {
    pub tree_id_or_name: String,
    pub target: String,
    pub start: Option<String>,
    /// Caller-supplied starting position, used only to compute
    /// `final_position_node_id` when nothing succeeds; does not affect
    /// pathfinding (`start` above does that).
    pub current_node_id: Option<NodeId>,
    pub navigation_path: Option<Vec<Transition>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    pub success: bool,
    pub transitions_executed: usize,
    pub total_transitions: usize,
    pub actions_executed: usize,
    pub total_actions: usize,
    pub execution_time_ms: u64,
    pub verification_results: Option<VerificationBatchResult>,
    pub navigation_path: Vec<String>,
    pub final_position_node_id: Option<NodeId>,
    pub error: Option<String>,
}

impl NavigationResult {
    fn failure(error: impl Into<String>, final_position_node_id: Option<NodeId>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            transitions_executed: 0,
            total_transitions: 0,
            actions_executed: 0,
            total_actions: 0,
            execution_time_ms: elapsed_ms,
            verification_results: None,
            navigation_path: Vec::new(),
            final_position_node_id,
            error: Some(error.into()),
        }
    }
}

pub async fn execute_navigation(
    store: &dyn Store,
    controllers: &ControllerRegistry,
    graph_cache: &NavigationGraphCache,
    request: NavigationRequest,
    context: &mut ExecutionContext,
) -> NavigationResult {
    let started = std::time::Instant::now();
    let team_id: TeamId = context.team_id.clone();

    let tree = match graph_cache
        .get_or_load(store, &request.tree_id_or_name, &team_id)
        .await
    {
        Ok(tree) => tree,
        Err(e) => {
            return NavigationResult::failure(
                format!("failed to load navigation tree: {e}"),
                request.current_node_id,
                started.elapsed().as_millis() as u64,
            )
        }
    };
    context.tree_id = Some(tree.tree_id.clone());
    context.userinterface_name = Some(tree.userinterface_name.clone());

    let transitions = match request.navigation_path {
        Some(path) => path,
        None => match pathfind::find_shortest_path(&tree, &request.target, request.start.as_deref()) {
            Ok(Some(path)) => path,
            Ok(None) => {
                return NavigationResult::failure(
                    "No navigation path found",
                    request.current_node_id,
                    started.elapsed().as_millis() as u64,
                )
            }
            Err(e) => {
                return NavigationResult::failure(
                    e.to_string(),
                    request.current_node_id,
                    started.elapsed().as_millis() as u64,
                )
            }
        },
    };

    let total_transitions = transitions.len();
    let total_actions: usize = transitions.iter().map(|t| t.actions.len()).sum();
    let mut transitions_executed = 0usize;
    let mut actions_executed = 0usize;
    let mut final_position = request.current_node_id.clone();
    let mut executed_descriptions = Vec::new();

    for transition in &transitions {
        let pre_screenshot = screenshots::capture(
            controllers,
            &context.device_model,
            &format!("pre_{}", transition.description()),
        )
        .await;

        let batch = actions::execute_actions(
            store,
            controllers,
            &transition.actions,
            &transition.retry_actions,
            &transition.failure_actions,
            Some(&transition.edge_id),
            Some(&transition.from_node),
            Some(&transition.to_node),
            context,
        )
        .await;
        actions_executed += batch.results.len();
        executed_descriptions.push(transition.description());

        let post_screenshot = screenshots::capture(
            controllers,
            &context.device_model,
            &format!("post_{}", transition.description()),
        )
        .await;
        context.screenshot_paths.extend(pre_screenshot.iter().cloned());
        context.screenshot_paths.extend(post_screenshot.iter().cloned());
        if let Some(step) = context.step_results.last_mut() {
            step.screenshot_path = post_screenshot.or(pre_screenshot);
        }

        if !batch.success {
            return NavigationResult {
                success: false,
                transitions_executed,
                total_transitions,
                actions_executed,
                total_actions,
                execution_time_ms: started.elapsed().as_millis() as u64,
                verification_results: None,
                navigation_path: executed_descriptions,
                final_position_node_id: final_position,
                error: Some(format!("transition {} failed", transition.description())),
            };
        }

        transitions_executed += 1;
        final_position = Some(transition.to_node.clone());
        if transition.final_wait_time_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(transition.final_wait_time_ms)).await;
        }
    }

    let target_node_id = match transitions.last() {
        Some(last) => Some(last.to_node.clone()),
        None => pathfind::resolve_node_id(&tree, &request.target),
    };

    let mut verification_results = None;
    let mut success = true;
    if let Some(target_node_id) = &target_node_id {
        if let Some(node) = tree.node(target_node_id) {
            if !node.verifications.is_empty() {
                let batch = verifications::execute_verifications(
                    store,
                    controllers,
                    &node.verifications,
                    Some(&tree.tree_id),
                    Some(&node.node_id),
                    PassCondition::All,
                    context,
                )
                .await;
                success = batch.success;
                if let Some(path) = screenshots::capture(controllers, &context.device_model, "analysis").await {
                    context.screenshot_paths.push(path.clone());
                    if let Some(step) = context.step_results.last_mut() {
                        step.screenshot_path = Some(path);
                    }
                }
                verification_results = Some(batch);
            }
        }
        final_position = Some(target_node_id.clone());
    }

    NavigationResult {
        success,
        transitions_executed,
        total_transitions,
        actions_executed,
        total_actions,
        execution_time_ms: started.elapsed().as_millis() as u64,
        verification_results,
        navigation_path: executed_descriptions,
        final_position_node_id: final_position,
        error: if success {
            None
        } else {
            Some("target verification failed".to_string())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vpt_controller::local::LocalController;
    use vpt_core::model::{
        Action, ActionId, ActionType, DeviceId, EdgeRecord, HostName, NavigationTree, NodeRecord,
        NodeType, TreeId,
    };
    use vpt_store::memory::InMemoryStore;

    fn ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(HostName::new("host1"), DeviceId::new("dev1"), TeamId::new("team1"));
        ctx.device_model = "mock".to_string();
        ctx
    }

    fn controllers() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry.register(Arc::new(LocalController::new("mock")));
        registry
    }

    fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.seed_action(Action {
            id: ActionId::new("a1"),
            device_model: "mock".into(),
            action_type: ActionType::Remote,
            command: "press_key".into(),
            params: [("key".to_string(), serde_json::json!("HOME"))]
                .into_iter()
                .collect(),
            requires_input: false,
            label: None,
        });
        store.seed_tree(NavigationTree {
            tree_id: TreeId::new("tree1"),
            team_id: TeamId::new("team1"),
            tree_name: "Main".into(),
            userinterface_name: "horizon".into(),
            nodes: vec![
                NodeRecord {
                    node_id: "home".into(),
                    label: "Home".into(),
                    node_type: NodeType::Entry,
                    verification_ids: vec![],
                },
                NodeRecord {
                    node_id: "live".into(),
                    label: "Live".into(),
                    node_type: NodeType::Screen,
                    verification_ids: vec![],
                },
            ],
            edges: vec![EdgeRecord {
                edge_id: "e1".into(),
                from_node: "home".into(),
                to_node: "live".into(),
                action_ids: vec!["a1".into()],
                retry_action_ids: vec![],
                failure_action_ids: vec![],
                final_wait_time_ms: 0,
            }],
        });
        store
    }

    #[tokio::test]
    async fn trivial_navigation_succeeds() {
        let store = seeded_store();
        let cache = NavigationGraphCache::new();
        let mut context = ctx();
        let result = execute_navigation(
            &store,
            &controllers(),
            &cache,
            NavigationRequest {
                tree_id_or_name: "tree1".to_string(),
                target: "live".to_string(),
                start: Some("home".to_string()),
                current_node_id: Some("home".into()),
                navigation_path: None,
            },
            &mut context,
        )
        .await;
        assert!(result.success);
        assert_eq!(result.transitions_executed, 1);
        assert_eq!(result.actions_executed, 1);
        assert!(result.verification_results.is_none());
        assert_eq!(context.step_results.len(), 1);
        assert_eq!(context.step_results[0].from_node.as_ref(), Some(&"home".into()));
        assert_eq!(context.step_results[0].to_node.as_ref(), Some(&"live".into()));
        assert!(context.step_results[0].screenshot_path.is_some());
        assert_eq!(context.screenshot_paths.len(), 2);
    }

    #[tokio::test]
    async fn unreachable_target_reports_no_path() {
        let store = InMemoryStore::new();
        store.seed_tree(NavigationTree {
            tree_id: TreeId::new("tree1"),
            team_id: TeamId::new("team1"),
            tree_name: "Main".into(),
            userinterface_name: "horizon".into(),
            nodes: vec![
                NodeRecord {
                    node_id: "home".into(),
                    label: "Home".into(),
                    node_type: NodeType::Entry,
                    verification_ids: vec![],
                },
                NodeRecord {
                    node_id: "island".into(),
                    label: "Island".into(),
                    node_type: NodeType::Screen,
                    verification_ids: vec![],
                },
            ],
            edges: vec![],
        });
        let cache = NavigationGraphCache::new();
        let mut context = ctx();
        let result = execute_navigation(
            &store,
            &controllers(),
            &cache,
            NavigationRequest {
                tree_id_or_name: "tree1".to_string(),
                target: "island".to_string(),
                start: Some("home".to_string()),
                current_node_id: Some("home".into()),
                navigation_path: None,
            },
            &mut context,
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("No navigation path found"));
    }
}
