//! Shortest-path queries and depth-first validation-sequence generation
//! over a cached, resolved navigation tree. The graph is inherently
//! cyclic — devices can navigate back to screens they came from — so
//! shortest path relies on BFS (not DFS-with-visited), and the validation
//! sequence tracks visited *edges*, not visited nodes, so it can still
//! walk into an already-visited node via a not-yet-exercised edge.

use std::collections::{HashMap, HashSet, VecDeque};

use vpt_core::model::{EdgeId, NodeId, NodeType, ResolvedNode, ResolvedTree, Transition};
use vpt_core::{Error, Result};

/// Resolves a node query by exact id, then exact label, then
/// case-insensitive label — the order the pathfinder uses for both
/// `target` and `start`. Exposed for callers (the navigation executor)
/// that need the same resolution without going through a path query.
pub fn resolve_node_id(tree: &ResolvedTree, query: &str) -> Option<NodeId> {
    resolve_node(tree, query)
}

fn resolve_node(tree: &ResolvedTree, query: &str) -> Option<NodeId> {
    let id = NodeId::new(query);
    if tree.nodes.contains_key(&id) {
        return Some(id);
    }
    if let Some(node) = tree.nodes.values().find(|n| n.label == query) {
        return Some(node.node_id.clone());
    }
    tree.nodes
        .values()
        .find(|n| n.label.eq_ignore_ascii_case(query))
        .map(|n| n.node_id.clone())
}

fn sorted_nodes(tree: &ResolvedTree) -> Vec<&ResolvedNode> {
    let mut nodes: Vec<&ResolvedNode> = tree.nodes.values().collect();
    nodes.sort_by(|a, b| a.node_id.as_str().cmp(b.node_id.as_str()));
    nodes
}

/// Dedicated `entry`-typed node if one exists; otherwise the first node in
/// a deterministic (id-sorted) order.
fn pick_default_start(tree: &ResolvedTree) -> Option<NodeId> {
    sorted_nodes(tree)
        .into_iter()
        .find(|n| n.node_type == NodeType::Entry)
        .or_else(|| sorted_nodes(tree).into_iter().next())
        .map(|n| n.node_id.clone())
}

fn entry_points(tree: &ResolvedTree) -> Vec<NodeId> {
    let entries: Vec<NodeId> = sorted_nodes(tree)
        .into_iter()
        .filter(|n| n.node_type == NodeType::Entry)
        .map(|n| n.node_id.clone())
        .collect();
    if !entries.is_empty() {
        return entries;
    }
    sorted_nodes(tree)
        .into_iter()
        .next()
        .map(|n| vec![n.node_id.clone()])
        .unwrap_or_default()
}

/// Unweighted shortest path by hop count. `Ok(None)` means target and
/// start are both valid nodes but no path connects them; resolution
/// failures (unknown target/start) are `Err`.
pub fn find_shortest_path(
    tree: &ResolvedTree,
    target: &str,
    start: Option<&str>,
) -> Result<Option<Vec<Transition>>> {
    let target_id = resolve_node(tree, target)
        .ok_or_else(|| Error::navigation(format!("target node not found: {target}")))?;
    let start_id = match start {
        Some(s) => resolve_node(tree, s)
            .ok_or_else(|| Error::navigation(format!("start node not found: {s}")))?,
        None => pick_default_start(tree)
            .ok_or_else(|| Error::navigation("navigation tree has no nodes"))?,
    };

    if start_id == target_id {
        return Ok(Some(Vec::new()));
    }

    let mut visited: HashSet<NodeId> = HashSet::new();
    visited.insert(start_id.clone());
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    queue.push_back(start_id.clone());
    let mut came_from: HashMap<NodeId, &Transition> = HashMap::new();

    'bfs: while let Some(current) = queue.pop_front() {
        let mut outgoing: Vec<&Transition> = tree.outgoing(&current).collect();
        outgoing.sort_by(|a, b| a.edge_id.as_str().cmp(b.edge_id.as_str()));
        for transition in outgoing {
            if visited.contains(&transition.to_node) {
                continue;
            }
            visited.insert(transition.to_node.clone());
            came_from.insert(transition.to_node.clone(), transition);
            if transition.to_node == target_id {
                break 'bfs;
            }
            queue.push_back(transition.to_node.clone());
        }
    }

    if !came_from.contains_key(&target_id) {
        tracing::warn!(
            target = target,
            start = start_id.as_str(),
            reachable_count = visited.len(),
            total_nodes = tree.nodes.len(),
            "no navigation path found"
        );
        return Ok(None);
    }

    let mut path = Vec::new();
    let mut cursor = target_id;
    while let Some(transition) = came_from.get(&cursor) {
        path.push((*transition).clone());
        cursor = transition.from_node.clone();
    }
    path.reverse();
    Ok(Some(path))
}

/// Depth-first traversal visiting every edge at least once: from each
/// entry point, walk outgoing edges in sorted order, emitting the forward
/// edge, recursing into the child, then emitting the return edge (if one
/// exists and is still unvisited) before moving to the next sibling. Any
/// edges left unreached by this walk (disconnected components) are
/// appended afterward in id order.
pub fn find_validation_sequence(tree: &ResolvedTree) -> Vec<Transition> {
    let mut adjacency: HashMap<NodeId, Vec<&Transition>> = HashMap::new();
    for transition in &tree.transitions {
        adjacency
            .entry(transition.from_node.clone())
            .or_default()
            .push(transition);
    }
    for edges in adjacency.values_mut() {
        edges.sort_by(|a, b| a.edge_id.as_str().cmp(b.edge_id.as_str()));
    }

    let mut visited_edges: HashSet<EdgeId> = HashSet::new();
    let mut sequence: Vec<Transition> = Vec::new();

    for start in entry_points(tree) {
        walk(&start, &adjacency, &mut visited_edges, &mut sequence);
    }

    let mut remaining: Vec<&Transition> = tree
        .transitions
        .iter()
        .filter(|t| !visited_edges.contains(&t.edge_id))
        .collect();
    remaining.sort_by(|a, b| a.edge_id.as_str().cmp(b.edge_id.as_str()));
    for transition in remaining {
        visited_edges.insert(transition.edge_id.clone());
        sequence.push(transition.clone());
    }

    sequence
}

fn walk<'a>(
    node: &NodeId,
    adjacency: &HashMap<NodeId, Vec<&'a Transition>>,
    visited_edges: &mut HashSet<EdgeId>,
    sequence: &mut Vec<Transition>,
) {
    let Some(edges) = adjacency.get(node) else {
        return;
    };
    for edge in edges.clone() {
        if visited_edges.contains(&edge.edge_id) {
            continue;
        }
        visited_edges.insert(edge.edge_id.clone());
        sequence.push(edge.clone());
        walk(&edge.to_node, adjacency, visited_edges, sequence);

        if let Some(return_edge) = adjacency
            .get(&edge.to_node)
            .and_then(|edges| edges.iter().find(|e| e.to_node == edge.from_node))
        {
            if !visited_edges.contains(&return_edge.edge_id) {
                visited_edges.insert(return_edge.edge_id.clone());
                sequence.push((*return_edge).clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use vpt_core::model::{TeamId, TreeId};

    fn node(id: &str, label: &str, node_type: NodeType) -> ResolvedNode {
        ResolvedNode {
            node_id: id.into(),
            label: label.into(),
            node_type,
            verifications: vec![],
        }
    }

    fn transition(edge_id: &str, from: &str, to: &str) -> Transition {
        Transition {
            edge_id: edge_id.into(),
            from_node: from.into(),
            to_node: to.into(),
            from_label: from.into(),
            to_label: to.into(),
            actions: vec![],
            retry_actions: vec![],
            failure_actions: vec![],
            final_wait_time_ms: 2000,
        }
    }

    fn linear_tree() -> ResolvedTree {
        let mut nodes = Map::new();
        nodes.insert("home".into(), node("home", "Home", NodeType::Entry));
        nodes.insert("menu".into(), node("menu", "Menu", NodeType::Screen));
        nodes.insert("live".into(), node("live", "Live", NodeType::Screen));
        ResolvedTree {
            tree_id: TreeId::new("t1"),
            team_id: TeamId::new("team1"),
            tree_name: "T".into(),
            userinterface_name: "ui".into(),
            nodes,
            transitions: vec![
                transition("e1", "home", "menu"),
                transition("e2", "menu", "live"),
                transition("e3", "live", "menu"),
            ],
        }
    }

    #[test]
    fn shortest_path_hop_count_matches_graph_distance() {
        let tree = linear_tree();
        let path = find_shortest_path(&tree, "live", Some("home")).unwrap().unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].edge_id.as_str(), "e1");
        assert_eq!(path[1].edge_id.as_str(), "e2");
    }

    #[test]
    fn same_source_and_target_returns_empty_list() {
        let tree = linear_tree();
        let path = find_shortest_path(&tree, "home", Some("home")).unwrap();
        assert_eq!(path, Some(Vec::new()));
    }

    #[test]
    fn disconnected_target_returns_none() {
        let mut tree = linear_tree();
        tree.nodes
            .insert("island".into(), node("island", "Island", NodeType::Screen));
        let path = find_shortest_path(&tree, "island", Some("home")).unwrap();
        assert!(path.is_none());
    }

    #[test]
    fn unknown_target_is_an_error() {
        let tree = linear_tree();
        assert!(find_shortest_path(&tree, "nowhere", Some("home")).is_err());
    }

    #[test]
    fn label_lookup_is_case_insensitive_fallback() {
        let tree = linear_tree();
        let path = find_shortest_path(&tree, "LIVE", Some("home")).unwrap();
        assert!(path.is_some());
    }

    #[test]
    fn validation_sequence_visits_every_edge_exactly_once() {
        let tree = linear_tree();
        let sequence = find_validation_sequence(&tree);
        let mut seen: HashSet<&str> = HashSet::new();
        for transition in &sequence {
            assert!(seen.insert(transition.edge_id.as_str()), "edge visited twice");
        }
        assert_eq!(seen.len(), tree.transitions.len());
    }

    #[test]
    fn validation_sequence_is_deterministic() {
        let tree = linear_tree();
        let a = find_validation_sequence(&tree);
        let b = find_validation_sequence(&tree);
        let a_ids: Vec<_> = a.iter().map(|t| t.edge_id.as_str().to_string()).collect();
        let b_ids: Vec<_> = b.iter().map(|t| t.edge_id.as_str().to_string()).collect();
        assert_eq!(a_ids, b_ids);
    }
}
