//! Core data model: trees, nodes, edges, actions, verifications, and the
//! per-invocation records threaded through the executors.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default wait time (ms) injected into an action's params during graph
/// resolution when the action's own `params.wait_time` is unset.
pub const DEFAULT_ACTION_WAIT_MS: u64 = 500;

/// Default `finalWaitTime` (ms) for an edge when the tree doesn't specify one.
pub const DEFAULT_EDGE_WAIT_MS: u64 = 2000;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Arc<str>);

        impl $name {
            pub fn new(s: impl Into<Arc<str>>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn new_uuid() -> Self {
                Self(Uuid::new_v4().to_string().into())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s.into())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.into())
            }
        }
    };
}

opaque_id!(TreeId);
opaque_id!(TeamId);
opaque_id!(NodeId);
opaque_id!(EdgeId);
opaque_id!(ActionId);
opaque_id!(VerificationId);
opaque_id!(TaskId);
opaque_id!(ScriptResultId);
opaque_id!(CampaignExecutionId);
opaque_id!(SessionId);
opaque_id!(HostName);
opaque_id!(DeviceId);

/// `host_name:device_id` composite key for the device lock coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceKey(pub Arc<str>);

impl DeviceKey {
    pub fn new(host: &HostName, device: &DeviceId) -> Self {
        Self(format!("{}:{}", host.as_str(), device.as_str()).into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Entry,
    Home,
    Screen,
    Other,
}

/// A single device-facing command executed by a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub device_model: String,
    pub action_type: ActionType,
    pub command: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    /// `true` if this action requires an operator-supplied value at
    /// `params.inputValue` to be meaningful (e.g. typing free text).
    #[serde(default)]
    pub requires_input: bool,
    #[serde(default)]
    pub label: Option<String>,
}

impl Action {
    /// Injects the default wait time if the action's params don't already
    /// carry one. Called once, at graph-resolution time.
    pub fn with_default_wait_time(mut self) -> Self {
        self.params
            .entry("wait_time".to_string())
            .or_insert_with(|| serde_json::json!(DEFAULT_ACTION_WAIT_MS));
        self
    }

    pub fn wait_time_ms(&self) -> u64 {
        self.params
            .get("wait_time")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_ACTION_WAIT_MS)
    }

    pub fn input_value(&self) -> Option<&serde_json::Value> {
        self.params.get("inputValue")
    }

    /// Minimal validity contract shared by every action kind: a non-empty
    /// command, and (if `requires_input`) a present `inputValue`.
    pub fn is_valid(&self) -> bool {
        if self.command.trim().is_empty() {
            return false;
        }
        if self.requires_input && self.input_value().is_none() {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Remote,
    Web,
    Power,
    Verification,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationType {
    Image,
    Text,
    Adb,
    Appium,
    Audio,
    Video,
    Web,
}

impl VerificationType {
    pub fn as_path_segment(self) -> &'static str {
        match self {
            VerificationType::Image => "image",
            VerificationType::Text => "text",
            VerificationType::Adb => "adb",
            VerificationType::Appium => "appium",
            VerificationType::Audio => "audio",
            VerificationType::Video => "video",
            VerificationType::Web => "web",
        }
    }
}

impl std::str::FromStr for VerificationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "image" => Ok(VerificationType::Image),
            "text" => Ok(VerificationType::Text),
            "adb" => Ok(VerificationType::Adb),
            "appium" => Ok(VerificationType::Appium),
            "audio" => Ok(VerificationType::Audio),
            "video" => Ok(VerificationType::Video),
            "web" => Ok(VerificationType::Web),
            other => Err(format!("unknown verification type: {other}")),
        }
    }
}

/// A post-condition check performed via a verification controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub id: VerificationId,
    pub verification_type: VerificationType,
    pub command: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

impl Verification {
    /// Per-type minimal-parameters contract from the data model: image
    /// needs `image_path`, text needs `text`, adb needs `search_term`.
    /// Other types have no additional minimum beyond a non-empty command.
    pub fn is_valid(&self) -> bool {
        if self.command.trim().is_empty() {
            return false;
        }
        match self.verification_type {
            VerificationType::Image => self.params.contains_key("image_path"),
            VerificationType::Text => self.params.contains_key("text"),
            VerificationType::Adb => self.params.contains_key("search_term"),
            _ => true,
        }
    }
}

/// A screen or application state in the navigation tree, as persisted
/// (carries ids, not resolved objects).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: NodeId,
    pub label: String,
    pub node_type: NodeType,
    #[serde(default)]
    pub verification_ids: Vec<VerificationId>,
}

/// A directed transition in the navigation tree, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub edge_id: EdgeId,
    pub from_node: NodeId,
    pub to_node: NodeId,
    #[serde(default)]
    pub action_ids: Vec<ActionId>,
    #[serde(default)]
    pub retry_action_ids: Vec<ActionId>,
    #[serde(default)]
    pub failure_action_ids: Vec<ActionId>,
    #[serde(default = "default_edge_wait_ms")]
    pub final_wait_time_ms: u64,
}

fn default_edge_wait_ms() -> u64 {
    DEFAULT_EDGE_WAIT_MS
}

/// The persisted navigation tree: a team-owned graph description keyed by
/// `tree_id`, with a human tree name and the userinterface it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationTree {
    pub tree_id: TreeId,
    pub team_id: TeamId,
    pub tree_name: String,
    pub userinterface_name: String,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

/// A node with its `verification_ids` materialized into concrete objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedNode {
    pub node_id: NodeId,
    pub label: String,
    pub node_type: NodeType,
    pub verifications: Vec<Verification>,
}

/// A resolved navigation edge, ready for execution: actions are objects,
/// not ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub edge_id: EdgeId,
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub from_label: String,
    pub to_label: String,
    pub actions: Vec<Action>,
    pub retry_actions: Vec<Action>,
    pub failure_actions: Vec<Action>,
    pub final_wait_time_ms: u64,
}

impl Transition {
    pub fn description(&self) -> String {
        format!("{} -> {}", self.from_label, self.to_label)
    }
}

/// Nodes and edges with `_ids` lists materialized into concrete objects;
/// the form the pathfinder and executors operate on.
#[derive(Debug, Clone)]
pub struct ResolvedTree {
    pub tree_id: TreeId,
    pub team_id: TeamId,
    pub tree_name: String,
    pub userinterface_name: String,
    pub nodes: HashMap<NodeId, ResolvedNode>,
    pub transitions: Vec<Transition>,
}

impl ResolvedTree {
    pub fn node(&self, id: &NodeId) -> Option<&ResolvedNode> {
        self.nodes.get(id)
    }

    /// Case-sensitive-first, case-insensitive-fallback label lookup.
    pub fn node_by_label(&self, label: &str) -> Option<&ResolvedNode> {
        self.nodes
            .values()
            .find(|n| n.label == label)
            .or_else(|| {
                self.nodes
                    .values()
                    .find(|n| n.label.eq_ignore_ascii_case(label))
            })
    }

    pub fn outgoing<'a>(&'a self, from: &NodeId) -> impl Iterator<Item = &'a Transition> + 'a {
        let from = from.clone();
        self.transitions.iter().filter(move |t| t.from_node == from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultType {
    Pass,
    Fail,
}

impl ResultType {
    pub fn from_success(success: bool) -> Self {
        if success {
            ResultType::Pass
        } else {
            ResultType::Fail
        }
    }
}

/// Per-invocation record shared across the orchestrator and its executors.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub host: HostName,
    pub selected_device: DeviceId,
    /// Device model of `selected_device`, used to pick a controller for
    /// verification dispatch (actions carry their own `device_model`).
    pub device_model: String,
    pub team_id: TeamId,
    pub tree_id: Option<TreeId>,
    pub userinterface_name: Option<String>,
    /// Set by the harness before execution; genuinely optional for ad hoc
    /// (non-script) calls into the action/verification executors.
    pub script_result_id: Option<ScriptResultId>,
    pub script_context: String,
    pub step_results: Vec<StepRecord>,
    pub screenshot_paths: Vec<String>,
    pub custom_data: HashMap<String, serde_json::Value>,
    pub overall_success: bool,
    pub error_message: Option<String>,
    pub start_time: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(host: HostName, selected_device: DeviceId, team_id: TeamId) -> Self {
        Self {
            host,
            selected_device,
            device_model: "unknown".to_string(),
            team_id,
            tree_id: None,
            userinterface_name: None,
            script_result_id: None,
            script_context: "direct".to_string(),
            step_results: Vec::new(),
            screenshot_paths: Vec::new(),
            custom_data: HashMap::new(),
            overall_success: true,
            error_message: None,
            start_time: Utc::now(),
        }
    }

    pub fn record_step(&mut self, step: StepRecord) {
        self.step_results.push(step);
    }
}

/// One entry appended to `step_results` in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub success: bool,
    pub screenshot_path: Option<String>,
    pub message: String,
    pub execution_time_ms: u64,
    pub from_node: Option<NodeId>,
    pub to_node: Option<NodeId>,
    pub actions: Vec<Action>,
    pub retry_actions: Vec<Action>,
    pub failure_actions: Vec<Action>,
    pub verifications: Vec<Verification>,
    pub verification_results: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Started,
    Running,
    Completed,
    Failed,
}

/// Task-manager entry tracking one unit of async work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub command: String,
    pub params: serde_json::Value,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub progress: serde_json::Value,
}

impl TaskRecord {
    pub fn new(id: TaskId, command: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            id,
            command: command.into(),
            params,
            status: TaskStatus::Started,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
            progress: serde_json::json!({}),
        }
    }
}

/// `device_key = host_name:device_id`, held while a script or interactive
/// operator owns the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSession {
    pub device_key: DeviceKey,
    pub session_id: SessionId,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Running,
    Completed,
    Failed,
}

/// One child script within a campaign's plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfiguration {
    pub script_name: String,
    pub script_type: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

/// Execution policy for a campaign run. Only sequential execution is in
/// scope; `parallel` is carried through the data model for forward
/// compatibility with the source but is rejected at the executor boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignPolicy {
    #[serde(default)]
    pub continue_on_failure: bool,
    pub timeout_minutes: u64,
    #[serde(default)]
    pub parallel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfiguration {
    pub campaign_name: String,
    pub userinterface_name: String,
    pub host_name: HostName,
    pub device_name: DeviceId,
    pub policy: CampaignPolicy,
    pub scripts: Vec<ScriptConfiguration>,
}

/// The parent record linking a sequence of script executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignExecution {
    pub campaign_execution_id: CampaignExecutionId,
    pub team_id: TeamId,
    pub campaign_name: String,
    pub userinterface_name: String,
    pub host_name: HostName,
    pub device_name: DeviceId,
    pub status: CampaignStatus,
    pub script_configurations: Vec<ScriptConfiguration>,
    pub script_result_ids: Vec<ScriptResultId>,
    pub executed_by: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub successful_scripts: u32,
    pub failed_scripts: u32,
    pub success: bool,
}
