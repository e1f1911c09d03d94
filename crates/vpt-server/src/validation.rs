//! Edge validation: driving a host through a set of tree edges to confirm
//! each transition's actions still work, without doing a full navigation.
//! Runs as a background task so the triggering HTTP request can return
//! its task id immediately.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vpt_core::model::{NodeId, TeamId, TreeId};
use vpt_exec::tasks::TaskManager;
use vpt_graph::NavigationGraphCache;
use vpt_store::Store;

use crate::proxy::HostClient;

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeToValidate {
    pub from_node: String,
    pub to_node: String,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub to_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationRunRequest {
    pub host: String,
    pub device_id: String,
    pub edges_to_validate: Vec<EdgeToValidate>,
}

#[derive(Debug, Clone, Serialize)]
struct EdgeValidationOutcome {
    from_node: String,
    to_node: String,
    success: bool,
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActionsEnvelope {
    success: bool,
    #[serde(default)]
    logs: String,
}

/// Spawns the background validation run and returns immediately; progress
/// and the final result land in the task record under `task_id`.
pub fn spawn_validation_run(
    tasks: Arc<TaskManager>,
    store: Arc<dyn Store>,
    graph_cache: Arc<NavigationGraphCache>,
    http_client: reqwest::Client,
    task_id: vpt_core::model::TaskId,
    tree_id: TreeId,
    team_id: TeamId,
    request: ValidationRunRequest,
) {
    tokio::spawn(async move {
        let tree = match graph_cache.get_or_load(store.as_ref(), tree_id.as_str(), &team_id).await {
            Ok(tree) => tree,
            Err(e) => {
                tasks.complete_task(&task_id, None, Some(e.to_string()));
                return;
            }
        };

        let host_client = HostClient::with_client(http_client, format!("http://{}", request.host));
        let total = request.edges_to_validate.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, edge) in request.edges_to_validate.iter().enumerate() {
            let from_id = NodeId::new(edge.from_node.as_str());
            let to_id = NodeId::new(edge.to_node.as_str());
            let transition = tree
                .transitions
                .iter()
                .find(|t| t.from_node == from_id && t.to_node == to_id);

            let outcome = match transition {
                None => EdgeValidationOutcome {
                    from_node: edge.from_node.clone(),
                    to_node: edge.to_node.clone(),
                    success: false,
                    error: Some("no transition connects the given nodes".to_string()),
                },
                Some(transition) => {
                    let body = serde_json::json!({
                        "actions": transition.actions,
                        "device_id": request.device_id,
                        "team_id": team_id.as_str(),
                    });
                    match host_client
                        .post_json::<_, ActionsEnvelope>("/execute/actions", &body)
                        .await
                    {
                        Ok(envelope) => EdgeValidationOutcome {
                            from_node: edge.from_node.clone(),
                            to_node: edge.to_node.clone(),
                            success: envelope.success,
                            error: None,
                        },
                        Err(e) => EdgeValidationOutcome {
                            from_node: edge.from_node.clone(),
                            to_node: edge.to_node.clone(),
                            success: false,
                            error: Some(e.to_string()),
                        },
                    }
                }
            };

            outcomes.push(outcome);
            tasks.update_task_progress(
                &task_id,
                serde_json::json!({ "completed": index + 1, "total": total }),
            );
        }

        let overall_success = outcomes.iter().all(|o| o.success);
        let result = serde_json::json!({ "edges": outcomes, "success": overall_success });
        let error = if overall_success {
            None
        } else {
            Some("one or more edges failed validation".to_string())
        };
        tasks.complete_task(&task_id, Some(result), error);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpt_core::model::TaskStatus;
    use vpt_store::memory::InMemoryStore;

    #[tokio::test]
    async fn unresolvable_edge_fails_without_a_host_call() {
        let tasks = Arc::new(TaskManager::new());
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let graph_cache = Arc::new(NavigationGraphCache::new());
        let team_id = TeamId::new("team-1");
        let tree_id = TreeId::new("missing-tree");
        let task_id = tasks.create_task("validation", serde_json::json!({}));

        spawn_validation_run(
            tasks.clone(),
            store,
            graph_cache,
            reqwest::Client::new(),
            task_id.clone(),
            tree_id,
            team_id,
            ValidationRunRequest {
                host: "127.0.0.1:1".to_string(),
                device_id: "device-1".to_string(),
                edges_to_validate: vec![EdgeToValidate {
                    from_node: "a".into(),
                    to_node: "b".into(),
                    from_name: None,
                    to_name: None,
                }],
            },
        );

        for _ in 0..50 {
            if let Some(record) = tasks.get_task(&task_id) {
                if record.status == TaskStatus::Failed {
                    return;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("validation task never reached a terminal state");
    }
}
