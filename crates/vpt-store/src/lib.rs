//! Persistence boundary. The execution core never talks to a database
//! directly — it talks to this trait. An in-memory implementation is
//! provided for tests and for hosts/servers that haven't wired a real
//! backing store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vpt_core::model::{
    Action, ActionId, CampaignExecutionId, CampaignStatus, DeviceId, EdgeId, HostName, NavigationTree,
    NodeId, ScriptResultId, TeamId, TreeId, Verification, VerificationId,
};
use vpt_core::Result;

pub mod memory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeExecutionRecord {
    pub team_id: TeamId,
    pub tree_id: TreeId,
    pub edge_id: EdgeId,
    pub host_name: HostName,
    pub device_model: String,
    pub success: bool,
    pub execution_time_ms: u64,
    pub message: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub script_result_id: Option<ScriptResultId>,
    pub script_context: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionRecord {
    pub team_id: TeamId,
    pub tree_id: TreeId,
    pub node_id: NodeId,
    pub host_name: HostName,
    pub success: bool,
    pub execution_time_ms: u64,
    pub message: Option<String>,
    pub script_result_id: Option<ScriptResultId>,
    pub script_context: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptResultRecord {
    pub id: ScriptResultId,
    pub team_id: TeamId,
    pub script_name: String,
    pub host_name: HostName,
    pub device_name: DeviceId,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub report: Option<serde_json::Value>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn load_tree(&self, tree_id: &TreeId, team_id: &TeamId) -> Result<NavigationTree>;

    /// Resolves a tree by its human tree name or userinterface name,
    /// case-sensitive first, case-insensitive fallback, matching the
    /// pathfinder's own label resolution order.
    async fn find_tree_id_by_name(&self, team_id: &TeamId, name: &str) -> Result<Option<TreeId>>;

    async fn save_tree(&self, tree: NavigationTree) -> Result<()>;

    async fn load_actions(
        &self,
        ids: &[ActionId],
    ) -> Result<HashMap<ActionId, Action>>;

    async fn load_verifications(
        &self,
        ids: &[VerificationId],
    ) -> Result<HashMap<VerificationId, Verification>>;

    async fn record_edge_execution(&self, record: EdgeExecutionRecord) -> Result<()>;

    async fn record_node_execution(&self, record: NodeExecutionRecord) -> Result<()>;

    async fn record_script_result(&self, record: ScriptResultRecord) -> Result<ScriptResultId>;

    /// Finds a script result matching `script_name` + `team_id` + `host_name`
    /// completed within the given time window, used by the campaign
    /// executor to link a spawned subprocess's result to its campaign.
    async fn find_script_result_in_window(
        &self,
        team_id: &TeamId,
        script_name: &str,
        host_name: &HostName,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Option<ScriptResultId>>;

    async fn create_campaign_execution(
        &self,
        team_id: &TeamId,
        campaign_name: &str,
        userinterface_name: &str,
        host_name: &HostName,
        device_name: &DeviceId,
        script_configurations: Vec<vpt_core::model::ScriptConfiguration>,
    ) -> Result<CampaignExecutionId>;

    /// Idempotent array-append: appending the same `script_result_id` twice
    /// leaves the campaign's `script_result_ids` unchanged after the first.
    async fn append_campaign_script_result(
        &self,
        campaign_execution_id: &CampaignExecutionId,
        script_result_id: &ScriptResultId,
    ) -> Result<()>;

    async fn complete_campaign_execution(
        &self,
        campaign_execution_id: &CampaignExecutionId,
        status: CampaignStatus,
        successful_scripts: u32,
        failed_scripts: u32,
        success: bool,
    ) -> Result<()>;

    async fn get_campaign_execution(
        &self,
        campaign_execution_id: &CampaignExecutionId,
    ) -> Result<Option<vpt_core::model::CampaignExecution>>;
}
