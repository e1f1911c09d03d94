//! Host HTTP surface: the process that runs on the machine physically
//! attached to a device, executing actions/verifications/navigation
//! against it and exposing typed verification and block endpoints for
//! the server to call into.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use vpt_blocks::registry::BlockRegistry;
use vpt_controller::ControllerRegistry;
use vpt_core::model::{Action, DeviceId, EdgeId, ExecutionContext, HostName, TeamId, Verification};
use vpt_exec::locks::DeviceLockCoordinator;
use vpt_exec::navigation::NavigationRequest;
use vpt_exec::orchestrator;
use vpt_exec::tasks::TaskManager;
use vpt_exec::verifications::PassCondition;
use vpt_graph::NavigationGraphCache;
use vpt_store::Store;

pub mod script_runner;

pub struct HostState {
    pub host_name: HostName,
    pub store: Arc<dyn Store>,
    pub controllers: ControllerRegistry,
    pub graph_cache: NavigationGraphCache,
    pub blocks: Arc<BlockRegistry>,
    pub locks: DeviceLockCoordinator,
    pub tasks: Arc<TaskManager>,
    pub scripts_dir: PathBuf,
    pub http_client: reqwest::Client,
}

pub fn router(state: Arc<HostState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/host/action/executeBatch", post(execute_action_batch))
        .route("/execute/navigation", post(execute_navigation))
        .route("/execute/actions", post(execute_actions))
        .route("/execute/verifications", post(execute_verifications))
        .route("/execute/blocks", post(execute_blocks))
        .route(
            "/host/verification/{verification_type}/execute",
            post(execute_typed_verification),
        )
        .route("/host/builder/execute", post(execute_builder_block))
        .route(
            "/host/builder/execution/{execution_id}/status",
            get(builder_execution_status),
        )
        .route("/host/script/execute", post(execute_script))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state)
}

async fn health(State(state): State<Arc<HostState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "host_name": state.host_name.as_str(),
        "cached_trees": state.graph_cache.len(),
    }))
}

fn context_for(team_id: &str, device_id: &str, host_name: &HostName) -> ExecutionContext {
    let mut context = ExecutionContext::new(
        host_name.clone(),
        DeviceId::new(device_id),
        TeamId::new(team_id),
    );
    context.device_model = "unknown".to_string();
    context
}

#[derive(Debug, Deserialize)]
struct TeamQuery {
    team_id: String,
}

#[derive(Debug, Deserialize)]
struct ActionBatchRequest {
    actions: Vec<Action>,
    #[serde(default)]
    retry_actions: Vec<Action>,
    #[serde(default)]
    failure_actions: Vec<Action>,
    device_id: String,
    #[serde(default)]
    edge_id: Option<EdgeId>,
    #[serde(default)]
    device_model: Option<String>,
}

async fn execute_action_batch(
    State(state): State<Arc<HostState>>,
    Query(query): Query<TeamQuery>,
    Json(body): Json<ActionBatchRequest>,
) -> impl IntoResponse {
    let mut context = context_for(&query.team_id, &body.device_id, &state.host_name);
    if let Some(model) = body.device_model {
        context.device_model = model;
    }
    let (result, logs) = vpt_exec::logging::execute_with_logging(vpt_exec::actions::execute_actions(
        state.store.as_ref(),
        &state.controllers,
        &body.actions,
        &body.retry_actions,
        &body.failure_actions,
        body.edge_id.as_ref(),
        None,
        None,
        &mut context,
    ))
    .await;
    Json(orchestrator::Envelope {
        success: result.success,
        logs,
        result,
    })
}

#[derive(Debug, Deserialize)]
struct NavigationExecuteRequest {
    device_id: String,
    team_id: String,
    tree_id: Option<String>,
    userinterface_name: Option<String>,
    target_node_id: Option<String>,
    target_node_label: Option<String>,
    start: Option<String>,
    current_node_id: Option<String>,
    #[serde(default)]
    device_model: Option<String>,
}

async fn execute_navigation(
    State(state): State<Arc<HostState>>,
    Json(body): Json<NavigationExecuteRequest>,
) -> impl IntoResponse {
    let mut context = context_for(&body.team_id, &body.device_id, &state.host_name);
    if let Some(model) = body.device_model {
        context.device_model = model;
    }
    let tree_key = body
        .tree_id
        .or(body.userinterface_name)
        .unwrap_or_default();
    let target = body
        .target_node_id
        .or(body.target_node_label)
        .unwrap_or_default();
    let request = NavigationRequest {
        tree_id_or_name: tree_key,
        target,
        start: body.start,
        current_node_id: body.current_node_id.map(Into::into),
        navigation_path: None,
    };
    let envelope = orchestrator::execute_navigation(
        state.store.as_ref(),
        &state.controllers,
        &state.graph_cache,
        request,
        &mut context,
    )
    .await;
    Json(envelope)
}

#[derive(Debug, Deserialize)]
struct ActionsRequest {
    actions: Vec<Action>,
    device_id: String,
    team_id: String,
    #[serde(default)]
    device_model: Option<String>,
}

async fn execute_actions(
    State(state): State<Arc<HostState>>,
    Json(body): Json<ActionsRequest>,
) -> impl IntoResponse {
    let mut context = context_for(&body.team_id, &body.device_id, &state.host_name);
    if let Some(model) = body.device_model {
        context.device_model = model;
    }
    let envelope = orchestrator::execute_actions(state.store.as_ref(), &state.controllers, &body.actions, &mut context)
        .await;
    Json(envelope)
}

#[derive(Debug, Deserialize)]
struct VerificationsRequest {
    verifications: Vec<Verification>,
    device_id: String,
    team_id: String,
    #[serde(default)]
    device_model: Option<String>,
    #[serde(default)]
    pass_condition: Option<PassCondition>,
}

async fn execute_verifications(
    State(state): State<Arc<HostState>>,
    Json(body): Json<VerificationsRequest>,
) -> impl IntoResponse {
    let mut context = context_for(&body.team_id, &body.device_id, &state.host_name);
    if let Some(model) = body.device_model {
        context.device_model = model;
    }
    let envelope = orchestrator::execute_verifications(
        state.store.as_ref(),
        &state.controllers,
        &body.verifications,
        body.pass_condition.unwrap_or_default(),
        &mut context,
    )
    .await;
    Json(envelope)
}

#[derive(Debug, Deserialize)]
struct BlocksRequest {
    command: String,
    #[serde(default)]
    params: serde_json::Value,
    device_id: String,
    team_id: String,
}

async fn execute_blocks(
    State(state): State<Arc<HostState>>,
    Json(body): Json<BlocksRequest>,
) -> impl IntoResponse {
    let context = context_for(&body.team_id, &body.device_id, &state.host_name);
    let envelope = orchestrator::execute_blocks(&state.blocks, &body.command, &body.params, &context).await;
    Json(envelope)
}

#[derive(Debug, Deserialize)]
struct TypedVerificationRequest {
    device_id: String,
    team_id: String,
    #[serde(default)]
    device_model: Option<String>,
    #[serde(flatten)]
    params: HashMap<String, serde_json::Value>,
}

async fn execute_typed_verification(
    State(state): State<Arc<HostState>>,
    Path(verification_type): Path<String>,
    Json(body): Json<TypedVerificationRequest>,
) -> impl IntoResponse {
    let Ok(verification_type) = verification_type.parse() else {
        return Json(serde_json::json!({
            "success": false,
            "error": format!("unknown verification type: {verification_type}")
        }));
    };
    let mut context = context_for(&body.team_id, &body.device_id, &state.host_name);
    if let Some(model) = body.device_model {
        context.device_model = model;
    }
    let verification = Verification {
        id: vpt_core::model::VerificationId::new_uuid(),
        verification_type,
        command: "check".to_string(),
        params: body.params,
    };
    let envelope = orchestrator::execute_verifications(
        state.store.as_ref(),
        &state.controllers,
        std::slice::from_ref(&verification),
        PassCondition::All,
        &mut context,
    )
    .await;
    Json(serde_json::to_value(envelope).expect("envelope serializes to JSON"))
}

async fn execute_builder_block(
    State(state): State<Arc<HostState>>,
    Json(body): Json<BlocksRequest>,
) -> impl IntoResponse {
    let context = context_for(&body.team_id, &body.device_id, &state.host_name);
    let execution_id = state
        .blocks
        .clone()
        .execute_async(body.command, body.params, context);
    Json(serde_json::json!({ "execution_id": execution_id }))
}

async fn builder_execution_status(
    State(state): State<Arc<HostState>>,
    Path(execution_id): Path<String>,
) -> impl IntoResponse {
    match state.blocks.execution_status(&execution_id) {
        Some(record) => Json(serde_json::to_value(record).unwrap_or_default()).into_response(),
        None => (axum::http::StatusCode::NOT_FOUND, "execution not found").into_response(),
    }
}

async fn execute_script(
    State(state): State<Arc<HostState>>,
    Json(body): Json<script_runner::ScriptExecuteRequest>,
) -> impl IntoResponse {
    let task_id = state
        .tasks
        .create_task("script_execute", serde_json::json!({ "script_name": body.script_name }));
    script_runner::spawn_script(
        state.tasks.clone(),
        state.http_client.clone(),
        state.scripts_dir.clone(),
        state.host_name.clone(),
        task_id.clone(),
        body,
    );
    (
        axum::http::StatusCode::ACCEPTED,
        Json(serde_json::json!({ "task_id": task_id.as_str(), "status": "started" })),
    )
}
