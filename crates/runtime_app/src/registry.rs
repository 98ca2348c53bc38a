use std::collections::HashMap;

use dom::{NodeId, TreeDocument};
use proto::RemoteId;

/// Worker-side identifier registry, one per session.
///
/// Identifiers are minted lazily the first time a node crosses the transport
/// and are stable afterwards. Entries are never retracted when a node leaves
/// the tree, so late-arriving event descriptors still resolve; a detached
/// node simply stops being mentioned by new records.
pub struct NodeIds {
    by_node: HashMap<NodeId, RemoteId>,
    by_id: HashMap<RemoteId, NodeId>,
    next: u64,
}

impl NodeIds {
    pub fn new() -> Self {
        Self {
            by_node: HashMap::new(),
            by_id: HashMap::new(),
            next: 1,
        }
    }

    /// Returns the node's identifier, minting one on first sight. The body
    /// is always the well-known marker, never a minted id.
    pub fn id_for(&mut self, doc: &TreeDocument, node: NodeId) -> RemoteId {
        if node == doc.body() {
            return RemoteId::body();
        }
        if let Some(id) = self.by_node.get(&node) {
            return id.clone();
        }
        let id = RemoteId::new(self.next.to_string());
        self.next += 1;
        self.by_node.insert(node, id.clone());
        self.by_id.insert(id.clone(), node);
        id
    }

    /// True when the receiving side has already been told about this node.
    pub fn is_known(&self, doc: &TreeDocument, node: NodeId) -> bool {
        node == doc.body() || self.by_node.contains_key(&node)
    }

    pub fn resolve(&self, doc: &TreeDocument, id: &RemoteId) -> Option<NodeId> {
        if id.is_body() {
            return Some(doc.body());
        }
        self.by_id.get(id).copied()
    }
}

impl Default for NodeIds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_distinct() {
        let mut doc = TreeDocument::new();
        let mut ids = NodeIds::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");

        let id_a = ids.id_for(&doc, a);
        let id_b = ids.id_for(&doc, b);
        assert_ne!(id_a, id_b);
        assert_eq!(ids.id_for(&doc, a), id_a);
        assert_eq!(ids.resolve(&doc, &id_a), Some(a));
        assert_eq!(ids.resolve(&doc, &id_b), Some(b));
    }

    #[test]
    fn body_resolves_through_the_marker() {
        let mut doc = TreeDocument::new();
        let mut ids = NodeIds::new();
        assert_eq!(ids.id_for(&doc, doc.body()), RemoteId::body());
        assert_eq!(ids.resolve(&doc, &RemoteId::body()), Some(doc.body()));
        assert!(ids.is_known(&doc, doc.body()));
    }

    #[test]
    fn removed_nodes_stay_resolvable() {
        let mut doc = TreeDocument::new();
        let mut ids = NodeIds::new();
        let el = doc.create_element("div");
        doc.append_child(doc.body(), el).unwrap();
        let id = ids.id_for(&doc, el);

        doc.remove_child(doc.body(), el).unwrap();
        assert_eq!(ids.resolve(&doc, &id), Some(el));
    }
}
