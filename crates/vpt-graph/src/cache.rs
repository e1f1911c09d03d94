//! Process-wide navigation graph cache: builds a resolved tree once per
//! interface and registers it under three equivalent keys — tree id, tree
//! name, userinterface name — so a lookup by any of the three returns the
//! same cached object.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use vpt_core::model::{
    NavigationTree, NodeId, ResolvedNode, ResolvedTree, TeamId, Transition, TreeId,
};
use vpt_core::{Error, Result};
use vpt_store::Store;

struct CacheEntry {
    tree: Arc<ResolvedTree>,
    cached_at: DateTime<Utc>,
}

/// `key = <tree_id_or_name>_<team_id>`, matching the source cache's
/// single-key scheme generalized across the three key spaces.
fn cache_key(key: &str, team_id: &TeamId) -> String {
    format!("{}_{}", key, team_id.as_str())
}

#[derive(Default)]
pub struct NavigationGraphCache {
    entries: DashMap<String, CacheEntry>,
}

impl NavigationGraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a previously-built graph by any of its three keys. Never
    /// triggers a rebuild on miss — callers must use `load` explicitly.
    pub fn get(&self, key: &str, team_id: &TeamId) -> Option<Arc<ResolvedTree>> {
        self.entries
            .get(&cache_key(key, team_id))
            .map(|e| e.tree.clone())
    }

    /// Registers `tree` under its tree id, tree name, and userinterface
    /// name simultaneously. Because all three entries hold a clone of the
    /// same `Arc`, they necessarily dereference to the same object.
    fn insert_all(&self, tree: Arc<ResolvedTree>) {
        let now = Utc::now();
        let keys = [
            tree.tree_id.as_str().to_string(),
            tree.tree_name.clone(),
            tree.userinterface_name.clone(),
        ];
        for key in keys {
            self.entries.insert(
                cache_key(&key, &tree.team_id),
                CacheEntry {
                    tree: tree.clone(),
                    cached_at: now,
                },
            );
        }
    }

    /// Removes all three keys for a tree, forcing the next `load` to
    /// rebuild from the store. Called on tree save.
    pub fn invalidate(&self, tree: &ResolvedTree) {
        for key in [
            tree.tree_id.as_str().to_string(),
            tree.tree_name.clone(),
            tree.userinterface_name.clone(),
        ] {
            self.entries.remove(&cache_key(&key, &tree.team_id));
        }
    }

    /// Loads a tree from the store and resolves it into the cache,
    /// overwriting any stale entry (used on save / forced rebuild).
    pub async fn load(
        &self,
        store: &dyn Store,
        tree_id: &TreeId,
        team_id: &TeamId,
    ) -> Result<Arc<ResolvedTree>> {
        let tree = store.load_tree(tree_id, team_id).await?;
        let resolved = Arc::new(resolve_tree(store, tree).await?);
        self.insert_all(resolved.clone());
        Ok(resolved)
    }

    /// Resolves `key` (a tree id, tree name, or userinterface name) to a
    /// tree id via the store, then serves it from cache or loads on miss.
    pub async fn get_or_load(
        &self,
        store: &dyn Store,
        key: &str,
        team_id: &TeamId,
    ) -> Result<Arc<ResolvedTree>> {
        if let Some(cached) = self.get(key, team_id) {
            return Ok(cached);
        }
        let tree_id = if let Some(found) = store.find_tree_id_by_name(team_id, key).await? {
            found
        } else {
            TreeId::new(key)
        };
        self.load(store, &tree_id, team_id).await
    }

    /// Age-based sweep, run on demand rather than on a dedicated timer so
    /// library callers don't pay for a background thread they didn't ask
    /// for.
    pub fn sweep(&self, max_age: Duration) {
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or_default();
        self.entries.retain(|_, entry| entry.cached_at >= cutoff);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects every distinct action/verification id referenced across edges
/// and nodes, bulk-resolves them, and builds the flat `ResolvedTree` the
/// pathfinder and executors operate on. Ids with no matching record are
/// dropped silently — resolution is best-effort by design.
async fn resolve_tree(store: &dyn Store, tree: NavigationTree) -> Result<ResolvedTree> {
    let action_ids: Vec<_> = tree
        .edges
        .iter()
        .flat_map(|e| {
            e.action_ids
                .iter()
                .chain(e.retry_action_ids.iter())
                .chain(e.failure_action_ids.iter())
        })
        .cloned()
        .collect();
    let verification_ids: Vec<_> = tree
        .nodes
        .iter()
        .flat_map(|n| n.verification_ids.iter())
        .cloned()
        .collect();

    let action_map = store.load_actions(&action_ids).await?;
    let verification_map = store.load_verifications(&verification_ids).await?;

    let resolve_actions = |ids: &[vpt_core::model::ActionId]| -> Vec<vpt_core::model::Action> {
        ids.iter()
            .filter_map(|id| action_map.get(id))
            .cloned()
            .map(|a| a.with_default_wait_time())
            .collect()
    };

    let node_labels: HashMap<NodeId, String> = tree
        .nodes
        .iter()
        .map(|n| (n.node_id.clone(), n.label.clone()))
        .collect();

    let nodes: HashMap<NodeId, ResolvedNode> = tree
        .nodes
        .into_iter()
        .map(|n| {
            let verifications = n
                .verification_ids
                .iter()
                .filter_map(|id| verification_map.get(id))
                .cloned()
                .collect();
            (
                n.node_id.clone(),
                ResolvedNode {
                    node_id: n.node_id,
                    label: n.label,
                    node_type: n.node_type,
                    verifications,
                },
            )
        })
        .collect();

    for edge in &tree.edges {
        if !nodes.contains_key(&edge.from_node) {
            return Err(Error::validation(format!(
                "edge {} references unknown from_node {}",
                edge.edge_id, edge.from_node
            )));
        }
        if !nodes.contains_key(&edge.to_node) {
            return Err(Error::validation(format!(
                "edge {} references unknown to_node {}",
                edge.edge_id, edge.to_node
            )));
        }
    }

    let transitions = tree
        .edges
        .into_iter()
        .map(|edge| Transition {
            from_label: node_labels
                .get(&edge.from_node)
                .cloned()
                .unwrap_or_default(),
            to_label: node_labels.get(&edge.to_node).cloned().unwrap_or_default(),
            edge_id: edge.edge_id,
            from_node: edge.from_node,
            to_node: edge.to_node,
            actions: resolve_actions(&edge.action_ids),
            retry_actions: resolve_actions(&edge.retry_action_ids),
            failure_actions: resolve_actions(&edge.failure_action_ids),
            final_wait_time_ms: edge.final_wait_time_ms,
        })
        .collect();

    Ok(ResolvedTree {
        tree_id: tree.tree_id,
        team_id: tree.team_id,
        tree_name: tree.tree_name,
        userinterface_name: tree.userinterface_name,
        nodes,
        transitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpt_core::model::{
        Action, ActionId, ActionType, EdgeRecord, NodeRecord, NodeType, TeamId,
    };
    use vpt_store::memory::InMemoryStore;

    fn seeded_store() -> (InMemoryStore, TreeId, TeamId) {
        let store = InMemoryStore::new();
        let team = TeamId::new("team1");
        let tree_id = TreeId::new("tree1");
        store.seed_action(Action {
            id: ActionId::new("a1"),
            device_model: "android_mobile".into(),
            action_type: ActionType::Remote,
            command: "press_key".into(),
            params: HashMap::new(),
            requires_input: false,
            label: Some("Press HOME".into()),
        });
        store.seed_tree(NavigationTree {
            tree_id: tree_id.clone(),
            team_id: team.clone(),
            tree_name: "Main Tree".into(),
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
                final_wait_time_ms: 2000,
            }],
        });
        (store, tree_id, team)
    }

    #[tokio::test]
    async fn resolved_actions_get_default_wait_time() {
        let (store, tree_id, team) = seeded_store();
        let cache = NavigationGraphCache::new();
        let tree = cache.load(&store, &tree_id, &team).await.unwrap();
        let transition = &tree.transitions[0];
        assert_eq!(transition.actions[0].wait_time_ms(), 500);
    }

    #[tokio::test]
    async fn triple_keys_dereference_to_same_object() {
        let (store, tree_id, team) = seeded_store();
        let cache = NavigationGraphCache::new();
        let by_id = cache.load(&store, &tree_id, &team).await.unwrap();
        let by_name = cache.get("Main Tree", &team).unwrap();
        let by_ui = cache.get("horizon", &team).unwrap();
        assert!(Arc::ptr_eq(&by_id, &by_name));
        assert!(Arc::ptr_eq(&by_id, &by_ui));
    }

    #[tokio::test]
    async fn invalidate_clears_all_three_keys() {
        let (store, tree_id, team) = seeded_store();
        let cache = NavigationGraphCache::new();
        let tree = cache.load(&store, &tree_id, &team).await.unwrap();
        cache.invalidate(&tree);
        assert!(cache.get(tree_id.as_str(), &team).is_none());
        assert!(cache.get("Main Tree", &team).is_none());
        assert!(cache.get("horizon", &team).is_none());
    }
}
