//! The spanning tree structures dissemination fan-out (§3, §4.3). Termination
//! relies on store-level dedup, not on tree acyclicity — the tree is an
//! optimization hint.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use broker_core::BrokerId;
use thiserror::Error;

pub type SpanningTree = HashMap<BrokerId, Vec<BrokerId>>;

#[derive(Debug, Error)]
pub enum SpanningTreeError {
    #[error("failed to read spanning tree file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },

    #[error("failed to parse spanning tree file {path}: {source}")]
    Parse { path: String, #[source] source: serde_json::Error },
}

/// Builds a star rooted at `max(peers ∪ {self})`, with every other node
/// named as a childless leaf (§3 "every node ... appears exactly once").
///
/// Ties are broken deterministically by sorting ids (§4.3 "Tie-break
/// rules") — irrelevant for a star specifically, but this is also where a
/// richer tree shape would need to make the same guarantee.
pub fn build_star(self_id: BrokerId, peers: &HashSet<BrokerId>) -> SpanningTree {
    let mut nodes: Vec<BrokerId> = peers.iter().copied().collect();
    nodes.push(self_id);
    nodes.sort_unstable();

    let root = *nodes.last().expect("nodes always contains at least self_id");
    let children: Vec<BrokerId> = nodes.iter().copied().filter(|&n| n != root).collect();

    let mut tree = SpanningTree::new();
    tree.insert(root, children.clone());
    for leaf in children {
        tree.insert(leaf, Vec::new());
    }
    tree
}

/// Loads a static override from a JSON file mapping node id to its list of
/// children (§4.3). Overrides the dynamic build for the initial tree only —
/// the next membership change rebuilds dynamically as usual.
pub fn load_static(path: &Path) -> Result<SpanningTree, SpanningTreeError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| SpanningTreeError::Read { path: path.display().to_string(), source })?;
    serde_json::from_str(&raw)
        .map_err(|source| SpanningTreeError::Parse { path: path.display().to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_roots_at_max_id() {
        let peers: HashSet<BrokerId> = [1, 2].into_iter().collect();
        let tree = build_star(3, &peers);
        assert_eq!(tree.len(), 3);
        let mut root_children = tree.get(&3).unwrap().clone();
        root_children.sort_unstable();
        assert_eq!(root_children, vec![1, 2]);
        assert_eq!(tree.get(&1).unwrap(), &Vec::<BrokerId>::new());
        assert_eq!(tree.get(&2).unwrap(), &Vec::<BrokerId>::new());
    }

    #[test]
    fn solo_broker_is_its_own_root() {
        let tree = build_star(1, &HashSet::new());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&1).unwrap(), &Vec::<BrokerId>::new());
    }

    #[test]
    fn rebuild_with_added_peer_changes_root() {
        let initial: HashSet<BrokerId> = [1].into_iter().collect();
        let tree = build_star(2, &initial);
        assert_eq!(*tree.get(&2).unwrap(), vec![1]);

        let expanded: HashSet<BrokerId> = [1, 2].into_iter().collect();
        let tree = build_star(3, &expanded);
        let mut children = tree.get(&3).unwrap().clone();
        children.sort_unstable();
        assert_eq!(children, vec![1, 2]);
    }
}
