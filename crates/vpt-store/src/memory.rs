//! In-memory `Store` used by tests and by binaries run without a
//! configured database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use vpt_core::model::{
    Action, ActionId, CampaignExecution, CampaignExecutionId, CampaignStatus, DeviceId, HostName,
    NavigationTree, ScriptConfiguration, ScriptResultId, TeamId, TreeId, Verification,
    VerificationId,
};
use vpt_core::{Error, Result};

use crate::{EdgeExecutionRecord, NodeExecutionRecord, ScriptResultRecord, Store};

#[derive(Default)]
pub struct InMemoryStore {
    trees: DashMap<TreeId, NavigationTree>,
    actions: DashMap<ActionId, Action>,
    verifications: DashMap<VerificationId, Verification>,
    edge_executions: DashMap<u64, EdgeExecutionRecord>,
    node_executions: DashMap<u64, NodeExecutionRecord>,
    script_results: DashMap<ScriptResultId, ScriptResultRecord>,
    campaigns: DashMap<CampaignExecutionId, CampaignExecution>,
    next_seq: std::sync::atomic::AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_tree(&self, tree: NavigationTree) {
        self.trees.insert(tree.tree_id.clone(), tree);
    }

    pub fn seed_action(&self, action: Action) {
        self.actions.insert(action.id.clone(), action);
    }

    pub fn seed_verification(&self, verification: Verification) {
        self.verifications
            .insert(verification.id.clone(), verification);
    }

    fn next_seq(&self) -> u64 {
        self.next_seq
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn load_tree(&self, tree_id: &TreeId, team_id: &TeamId) -> Result<NavigationTree> {
        self.trees
            .get(tree_id)
            .filter(|t| &t.team_id == team_id)
            .map(|t| t.clone())
            .ok_or_else(|| Error::validation(format!("tree not found: {tree_id}")))
    }

    async fn find_tree_id_by_name(&self, team_id: &TeamId, name: &str) -> Result<Option<TreeId>> {
        // Exact id match first (callers may pass a tree id through the
        // "name" slot when they already know it).
        if let Some(entry) = self.trees.get(&TreeId::new(name)) {
            if &entry.team_id == team_id {
                return Ok(Some(entry.tree_id.clone()));
            }
        }
        let matches_name = |t: &NavigationTree, case_sensitive: bool| {
            if case_sensitive {
                t.tree_name == name || t.userinterface_name == name
            } else {
                t.tree_name.eq_ignore_ascii_case(name)
                    || t.userinterface_name.eq_ignore_ascii_case(name)
            }
        };
        if let Some(entry) = self
            .trees
            .iter()
            .find(|t| &t.team_id == team_id && matches_name(&t, true))
        {
            return Ok(Some(entry.tree_id.clone()));
        }
        if let Some(entry) = self
            .trees
            .iter()
            .find(|t| &t.team_id == team_id && matches_name(&t, false))
        {
            return Ok(Some(entry.tree_id.clone()));
        }
        Ok(None)
    }

    async fn save_tree(&self, tree: NavigationTree) -> Result<()> {
        self.trees.insert(tree.tree_id.clone(), tree);
        Ok(())
    }

    async fn load_actions(&self, ids: &[ActionId]) -> Result<HashMap<ActionId, Action>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.actions.get(id).map(|a| (id.clone(), a.clone())))
            .collect())
    }

    async fn load_verifications(
        &self,
        ids: &[VerificationId],
    ) -> Result<HashMap<VerificationId, Verification>> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.verifications
                    .get(id)
                    .map(|v| (id.clone(), v.clone()))
            })
            .collect())
    }

    async fn record_edge_execution(&self, record: EdgeExecutionRecord) -> Result<()> {
        self.edge_executions.insert(self.next_seq(), record);
        Ok(())
    }

    async fn record_node_execution(&self, record: NodeExecutionRecord) -> Result<()> {
        self.node_executions.insert(self.next_seq(), record);
        Ok(())
    }

    async fn record_script_result(&self, record: ScriptResultRecord) -> Result<ScriptResultId> {
        let id = record.id.clone();
        self.script_results.insert(id.clone(), record);
        Ok(id)
    }

    async fn find_script_result_in_window(
        &self,
        team_id: &TeamId,
        script_name: &str,
        host_name: &HostName,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Option<ScriptResultId>> {
        Ok(self
            .script_results
            .iter()
            .filter(|r| {
                &r.team_id == team_id
                    && r.script_name == script_name
                    && &r.host_name == host_name
                    && r.completed_at >= window_start
                    && r.completed_at <= window_end
            })
            .max_by_key(|r| r.completed_at)
            .map(|r| r.id.clone()))
    }

    async fn create_campaign_execution(
        &self,
        team_id: &TeamId,
        campaign_name: &str,
        userinterface_name: &str,
        host_name: &HostName,
        device_name: &DeviceId,
        script_configurations: Vec<ScriptConfiguration>,
    ) -> Result<CampaignExecutionId> {
        let id = CampaignExecutionId::new_uuid();
        let execution = CampaignExecution {
            campaign_execution_id: id.clone(),
            team_id: team_id.clone(),
            campaign_name: campaign_name.to_string(),
            userinterface_name: userinterface_name.to_string(),
            host_name: host_name.clone(),
            device_name: device_name.clone(),
            status: CampaignStatus::Running,
            script_configurations,
            script_result_ids: Vec::new(),
            executed_by: None,
            started_at: Utc::now(),
            completed_at: None,
            successful_scripts: 0,
            failed_scripts: 0,
            success: false,
        };
        self.campaigns.insert(id.clone(), execution);
        Ok(id)
    }

    async fn append_campaign_script_result(
        &self,
        campaign_execution_id: &CampaignExecutionId,
        script_result_id: &ScriptResultId,
    ) -> Result<()> {
        let mut entry = self
            .campaigns
            .get_mut(campaign_execution_id)
            .ok_or_else(|| Error::validation("campaign execution not found"))?;
        if !entry.script_result_ids.contains(script_result_id) {
            entry.script_result_ids.push(script_result_id.clone());
        }
        Ok(())
    }

    async fn complete_campaign_execution(
        &self,
        campaign_execution_id: &CampaignExecutionId,
        status: CampaignStatus,
        successful_scripts: u32,
        failed_scripts: u32,
        success: bool,
    ) -> Result<()> {
        let mut entry = self
            .campaigns
            .get_mut(campaign_execution_id)
            .ok_or_else(|| Error::validation("campaign execution not found"))?;
        entry.status = status;
        entry.successful_scripts = successful_scripts;
        entry.failed_scripts = failed_scripts;
        entry.success = success;
        entry.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn get_campaign_execution(
        &self,
        campaign_execution_id: &CampaignExecutionId,
    ) -> Result<Option<CampaignExecution>> {
        Ok(self
            .campaigns
            .get(campaign_execution_id)
            .map(|e| e.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpt_core::model::{EdgeRecord, NavigationTree, NodeRecord, NodeType};

    fn sample_tree() -> NavigationTree {
        NavigationTree {
            tree_id: TreeId::new("t1"),
            team_id: TeamId::new("team1"),
            tree_name: "Main".into(),
            userinterface_name: "horizon".into(),
            nodes: vec![NodeRecord {
                node_id: "home".into(),
                label: "Home".into(),
                node_type: NodeType::Home,
                verification_ids: vec![],
            }],
            edges: vec![],
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemoryStore::new();
        let tree = sample_tree();
        store.save_tree(tree.clone()).await.unwrap();
        let loaded = store
            .load_tree(&tree.tree_id, &tree.team_id)
            .await
            .unwrap();
        assert_eq!(loaded.tree_name, tree.tree_name);
    }

    #[tokio::test]
    async fn find_by_name_is_case_insensitive_fallback() {
        let store = InMemoryStore::new();
        let tree = sample_tree();
        let team = tree.team_id.clone();
        store.save_tree(tree).await.unwrap();
        let found = store
            .find_tree_id_by_name(&team, "HORIZON")
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn campaign_append_is_idempotent() {
        let store = InMemoryStore::new();
        let team = TeamId::new("team1");
        let id = store
            .create_campaign_execution(
                &team,
                "nightly",
                "horizon",
                &HostName::new("host1"),
                &DeviceId::new("dev1"),
                vec![],
            )
            .await
            .unwrap();
        let script_result = ScriptResultId::new_uuid();
        store
            .append_campaign_script_result(&id, &script_result)
            .await
            .unwrap();
        store
            .append_campaign_script_result(&id, &script_result)
            .await
            .unwrap();
        let campaign = store.get_campaign_execution(&id).await.unwrap().unwrap();
        assert_eq!(campaign.script_result_ids.len(), 1);
    }
}
