//! Server HTTP surface: the central coordinator operators and CI talk to.
//! Long operations (validation runs, async script execution) return a
//! task id immediately and do their work on a background task, following
//! the same request-returns-fast-background-worker-finishes split used on
//! the host side for builder blocks.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use vpt_core::model::{TaskId, TeamId, TreeId};
use vpt_exec::tasks::TaskManager;
use vpt_graph::NavigationGraphCache;
use vpt_store::Store;

pub mod proxy;
pub mod scripts;
pub mod validation;

pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub graph_cache: Arc<NavigationGraphCache>,
    pub tasks: Arc<TaskManager>,
    pub scripts_dir: PathBuf,
    pub server_url: Option<String>,
    pub http_client: reqwest::Client,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/server/validation/run/{tree_id}", post(validation_run))
        .route("/server/validation/status/{task_id}", get(validation_status))
        .route("/server/script/execute", post(script_execute))
        .route("/server/script/taskComplete", post(script_task_complete))
        .route("/server/script/list", get(script_list))
        .route("/server/script/analyze", get(script_analyze))
        .route("/server/pathfinding/preview/{tree_id}", get(pathfinding_preview))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

#[derive(Debug, Deserialize)]
struct TeamQuery {
    team_id: String,
}

async fn validation_run(
    State(state): State<Arc<ServerState>>,
    Path(tree_id): Path<String>,
    Query(query): Query<TeamQuery>,
    Json(body): Json<validation::ValidationRunRequest>,
) -> impl IntoResponse {
    let team_id = TeamId::new(query.team_id.as_str());
    let task_id = state.tasks.create_task(
        "validation_run",
        serde_json::json!({ "tree_id": tree_id, "edge_count": body.edges_to_validate.len() }),
    );
    validation::spawn_validation_run(
        state.tasks.clone(),
        state.store.clone(),
        state.graph_cache.clone(),
        state.http_client.clone(),
        task_id.clone(),
        TreeId::new(tree_id.as_str()),
        team_id,
        body,
    );
    (
        axum::http::StatusCode::ACCEPTED,
        Json(serde_json::json!({ "task_id": task_id.as_str(), "status": "started" })),
    )
}

async fn validation_status(
    State(state): State<Arc<ServerState>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    match state.tasks.get_task(&TaskId::new(task_id.as_str())) {
        Some(record) => Json(serde_json::to_value(record).unwrap_or_default()).into_response(),
        None => (axum::http::StatusCode::NOT_FOUND, "task not found").into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ScriptExecuteBody {
    host: String,
    script_name: String,
    device_id: String,
    #[serde(default)]
    userinterface_name: Option<String>,
    #[serde(default)]
    parameters: std::collections::HashMap<String, serde_json::Value>,
}

async fn script_execute(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<ScriptExecuteBody>,
) -> impl IntoResponse {
    let task_id = state.tasks.create_task(
        "script_execute",
        serde_json::json!({ "script_name": body.script_name, "host": body.host }),
    );
    let callback_url = state
        .server_url
        .as_ref()
        .map(|url| format!("{}/server/script/taskComplete", url.trim_end_matches('/')));

    let host_client = proxy::HostClient::with_client(state.http_client.clone(), format!("http://{}", body.host));
    let request_body = serde_json::json!({
        "script_name": body.script_name,
        "userinterface_name": body.userinterface_name,
        "device_id": body.device_id,
        "parameters": body.parameters,
        "callback_url": callback_url,
    });
    let tasks = state.tasks.clone();
    let task_id_for_spawn = task_id.clone();
    tokio::spawn(async move {
        let outcome = host_client
            .post_json::<_, serde_json::Value>("/host/script/execute", &request_body)
            .await;
        if let Err(e) = outcome {
            tasks.complete_task(&task_id_for_spawn, None, Some(e.to_string()));
        }
        // On success, the host dispatches asynchronously and the task is
        // completed later via the `/server/script/taskComplete` callback.
    });

    (
        axum::http::StatusCode::ACCEPTED,
        Json(serde_json::json!({ "task_id": task_id.as_str(), "status": "started" })),
    )
}

#[derive(Debug, Deserialize)]
struct TaskCompleteBody {
    task_id: String,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

async fn script_task_complete(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<TaskCompleteBody>,
) -> impl IntoResponse {
    state
        .tasks
        .complete_task(&TaskId::new(body.task_id.as_str()), body.result, body.error);
    Json(serde_json::json!({ "acknowledged": true }))
}

async fn script_list(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(scripts::list_scripts(&state.scripts_dir))
}

#[derive(Debug, Deserialize)]
struct ScriptAnalyzeQuery {
    script_name: String,
}

async fn script_analyze(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ScriptAnalyzeQuery>,
) -> impl IntoResponse {
    match scripts::analyze_script(&state.scripts_dir, &query.script_name) {
        Some(manifest) => Json(serde_json::to_value(manifest).unwrap_or_default()).into_response(),
        None => (axum::http::StatusCode::NOT_FOUND, "script not found").into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    team_id: String,
    target: String,
    #[serde(default)]
    start: Option<String>,
}

async fn pathfinding_preview(
    State(state): State<Arc<ServerState>>,
    Path(tree_id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> impl IntoResponse {
    let team_id = TeamId::new(query.team_id.as_str());
    let tree = match state
        .graph_cache
        .get_or_load(state.store.as_ref(), &tree_id, &team_id)
        .await
    {
        Ok(tree) => tree,
        Err(e) => {
            return (axum::http::StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    match vpt_graph::pathfind::find_shortest_path(&tree, &query.target, query.start.as_deref()) {
        Ok(Some(path)) => Json(serde_json::json!({
            "found": true,
            "hops": path.len(),
            "transitions": path.iter().map(|t| t.description()).collect::<Vec<_>>(),
        }))
        .into_response(),
        Ok(None) => Json(serde_json::json!({ "found": false })).into_response(),
        Err(e) => (axum::http::StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}
