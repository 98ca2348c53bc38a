//! Converts captured local mutations into transmission-safe wire records.
//!
//! Node handles become identifiers (minted on first sight); the specific
//! fields that embed whole nodes (childList added lists) carry a full
//! recursive skeleton when the receiving side has never seen the node, and a
//! bare identifier otherwise. Sanitizing the same node twice always yields
//! the same identifier.

use dom::{Mutation, MutationKind, NodeId, TreeDocument};
use proto::{AddedNode, AttrEntry, ChangeRecord, NodeSkeleton, NodeType, PropValue};

use crate::registry::NodeIds;

/// Field names that never cross the boundary, as data rather than a naming
/// convention baked into the walk. Double-underscore-prefixed names are
/// rejected wholesale in addition to this list.
pub const DENY_LIST: &[&str] = &[
    "parentNode",
    "childNodes",
    "children",
    "handlers",
    "observers",
];

pub(crate) fn is_denied(name: &str) -> bool {
    name.starts_with("__") || DENY_LIST.contains(&name)
}

/// Sanitizes one captured batch, in capture order. Records whose payload is
/// entirely internal bookkeeping are dropped.
pub fn sanitize_batch(
    doc: &TreeDocument,
    ids: &mut NodeIds,
    mutations: Vec<Mutation>,
) -> Vec<ChangeRecord> {
    mutations
        .into_iter()
        .filter_map(|mutation| sanitize_mutation(doc, ids, mutation))
        .collect()
}

fn sanitize_mutation(
    doc: &TreeDocument,
    ids: &mut NodeIds,
    mutation: Mutation,
) -> Option<ChangeRecord> {
    let target = ids.id_for(doc, mutation.target);
    match mutation.kind {
        MutationKind::ChildList {
            added,
            removed,
            previous_sibling,
            next_sibling,
        } => Some(ChangeRecord::ChildList {
            target,
            added_nodes: added
                .into_iter()
                .map(|node| sanitize_added(doc, ids, node))
                .collect(),
            removed_nodes: removed
                .into_iter()
                .map(|node| ids.id_for(doc, node))
                .collect(),
            previous_sibling: previous_sibling.map(|node| ids.id_for(doc, node)),
            next_sibling: next_sibling.map(|node| ids.id_for(doc, node)),
        }),
        MutationKind::Attributes {
            name,
            ns,
            value,
            old_value,
        } => {
            if is_denied(&name) {
                log::debug!("dropping denied attribute {name:?} from record for {target}");
                return None;
            }
            Some(ChangeRecord::Attributes {
                target,
                attribute_name: name,
                attribute_ns: ns,
                value,
                old_value,
            })
        }
        MutationKind::CharacterData { value, old_value } => Some(ChangeRecord::CharacterData {
            target,
            value,
            old_value: Some(old_value),
        }),
        MutationKind::Properties {
            name,
            value,
            old_value,
        } => {
            if is_denied(&name) {
                log::debug!("dropping denied property {name:?} from record for {target}");
                return None;
            }
            Some(ChangeRecord::Properties {
                target,
                property_name: name,
                value: prop_to_wire(&value),
                old_value: old_value.as_ref().map(prop_to_wire),
            })
        }
    }
}

fn sanitize_added(doc: &TreeDocument, ids: &mut NodeIds, node: NodeId) -> AddedNode {
    if ids.is_known(doc, node) {
        AddedNode::Known(ids.id_for(doc, node))
    } else {
        AddedNode::Node(Box::new(skeleton(doc, ids, node)))
    }
}

/// Fully serializes `node` and its descendants, minting identifiers for the
/// whole subtree.
pub fn skeleton(doc: &TreeDocument, ids: &mut NodeIds, node: NodeId) -> NodeSkeleton {
    let id = ids.id_for(doc, node);
    let node_type = match doc.node_type(node) {
        dom::TEXT_NODE => NodeType::Text,
        dom::DOCUMENT_NODE => NodeType::Document,
        _ => NodeType::Element,
    };
    let class_name = doc.property(node, "className").and_then(|value| match value {
        dom::PropValue::Text(text) => Some(text.clone()),
        _ => None,
    });
    NodeSkeleton {
        node_type,
        node_name: doc.node_name(node).to_string(),
        id,
        attributes: doc
            .attributes(node)
            .iter()
            .map(|attr| AttrEntry {
                ns: attr.ns.clone(),
                name: attr.name.clone(),
                value: attr.value.clone(),
            })
            .collect(),
        style: doc.style(node).to_vec(),
        class_name,
        data: doc.text(node).map(str::to_string),
        child_nodes: doc
            .children(node)
            .to_vec()
            .into_iter()
            .map(|child| skeleton(doc, ids, child))
            .collect(),
    }
}

pub(crate) fn prop_to_wire(value: &dom::PropValue) -> PropValue {
    match value {
        dom::PropValue::Bool(b) => PropValue::Bool(*b),
        dom::PropValue::Number(n) => PropValue::Number(*n),
        dom::PropValue::Text(s) => PropValue::Text(s.clone()),
    }
}

pub(crate) fn prop_from_wire(value: &PropValue) -> dom::PropValue {
    match value {
        PropValue::Bool(b) => dom::PropValue::Bool(*b),
        PropValue::Number(n) => dom::PropValue::Number(*n),
        PropValue::Text(s) => dom::PropValue::Text(s.clone()),
    }
}
