//! Replays change records against the stage.

use std::fmt;

use proto::{AddedNode, ChangeRecord, NodeSkeleton, NodeType, RemoteId};

use crate::bindings::{BindError, StageBindings};
use crate::stage::{Stage, StageError, StageKey};

/// Protocol-consistency failure. Any of these poisons the batch: the two
/// trees can no longer be assumed to agree.
#[derive(Debug)]
pub enum ReplayError {
    UnresolvedTarget(RemoteId),
    UnresolvedNode(RemoteId),
    UnresolvedSibling(RemoteId),
    Binding(BindError),
    Stage(StageError),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::UnresolvedTarget(id) => write!(f, "record target {id} cannot be resolved"),
            ReplayError::UnresolvedNode(id) => write!(f, "referenced node {id} cannot be resolved"),
            ReplayError::UnresolvedSibling(id) => {
                write!(f, "sibling reference {id} cannot be resolved")
            }
            ReplayError::Binding(err) => write!(f, "{err}"),
            ReplayError::Stage(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<BindError> for ReplayError {
    fn from(err: BindError) -> Self {
        ReplayError::Binding(err)
    }
}

impl From<StageError> for ReplayError {
    fn from(err: StageError) -> Self {
        ReplayError::Stage(err)
    }
}

/// Applies one record. Targets resolve through the bindings, with the body
/// marker landing on the configured mount element.
pub fn apply_record<S: Stage>(
    stage: &mut S,
    bindings: &mut StageBindings,
    record: &ChangeRecord,
) -> Result<(), ReplayError> {
    let mount = stage.mount();
    match record {
        ChangeRecord::ChildList {
            target,
            added_nodes,
            removed_nodes,
            next_sibling,
            ..
        } => {
            let parent = resolve_target(bindings, mount, target)?;
            // Tail first, so positions of earlier siblings stay stable.
            for removed in removed_nodes.iter().rev() {
                let node = bindings
                    .resolve(removed, mount)
                    .ok_or_else(|| ReplayError::UnresolvedNode(removed.clone()))?;
                stage.remove_child(parent, node)?;
            }
            for added in added_nodes {
                let node = match added {
                    AddedNode::Known(id) => bindings
                        .resolve(id, mount)
                        .ok_or_else(|| ReplayError::UnresolvedNode(id.clone()))?,
                    AddedNode::Node(skeleton) => materialize(stage, bindings, skeleton)?,
                };
                let reference = match next_sibling {
                    Some(id) => Some(
                        bindings
                            .resolve(id, mount)
                            .ok_or_else(|| ReplayError::UnresolvedSibling(id.clone()))?,
                    ),
                    None => None,
                };
                stage.insert_before(parent, node, reference)?;
            }
            Ok(())
        }
        ChangeRecord::Attributes {
            target,
            attribute_name,
            attribute_ns,
            value,
            ..
        } => {
            let key = resolve_target(bindings, mount, target)?;
            match value {
                Some(value) => {
                    stage.set_attribute(key, attribute_ns.as_deref(), attribute_name, value)?
                }
                None => stage.remove_attribute(key, attribute_ns.as_deref(), attribute_name)?,
            }
            Ok(())
        }
        ChangeRecord::CharacterData { target, value, .. } => {
            let key = resolve_target(bindings, mount, target)?;
            stage.set_text(key, value)?;
            Ok(())
        }
        ChangeRecord::Properties {
            target,
            property_name,
            value,
            ..
        } => {
            let key = resolve_target(bindings, mount, target)?;
            stage.set_property(key, property_name, value)?;
            Ok(())
        }
    }
}

/// Creates the skeleton's whole subtree on the stage, registering every
/// descendant's identifier.
pub fn materialize<S: Stage>(
    stage: &mut S,
    bindings: &mut StageBindings,
    skeleton: &NodeSkeleton,
) -> Result<StageKey, ReplayError> {
    let key = match skeleton.node_type {
        NodeType::Text => stage.create_text(skeleton.data.as_deref().unwrap_or("")),
        NodeType::Element | NodeType::Document => {
            let key = stage.create_element(&skeleton.node_name);
            if let Some(class_name) = &skeleton.class_name {
                stage.set_attribute(key, None, "class", class_name)?;
            }
            for (name, value) in &skeleton.style {
                stage.set_style(key, name, value)?;
            }
            for attr in &skeleton.attributes {
                stage.set_attribute(key, attr.ns.as_deref(), &attr.name, &attr.value)?;
            }
            key
        }
    };
    bindings.bind(skeleton.id.clone(), key)?;
    for child in &skeleton.child_nodes {
        let child_key = materialize(stage, bindings, child)?;
        stage.insert_before(key, child_key, None)?;
    }
    Ok(key)
}

fn resolve_target(
    bindings: &StageBindings,
    mount: StageKey,
    target: &RemoteId,
) -> Result<StageKey, ReplayError> {
    bindings
        .resolve(target, mount)
        .ok_or_else(|| ReplayError::UnresolvedTarget(target.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ArenaPage;
    use proto::{AttrEntry, PropValue};

    fn skeleton(name: &str, id: &str) -> NodeSkeleton {
        NodeSkeleton {
            node_type: NodeType::Element,
            node_name: name.to_string(),
            id: RemoteId::new(id),
            attributes: Vec::new(),
            style: Vec::new(),
            class_name: None,
            data: None,
            child_nodes: Vec::new(),
        }
    }

    fn text_skeleton(data: &str, id: &str) -> NodeSkeleton {
        NodeSkeleton {
            node_type: NodeType::Text,
            node_name: "#text".to_string(),
            id: RemoteId::new(id),
            attributes: Vec::new(),
            style: Vec::new(),
            class_name: None,
            data: Some(data.to_string()),
            child_nodes: Vec::new(),
        }
    }

    #[test]
    fn append_skeleton_to_body_target() {
        let mut page = ArenaPage::new();
        let mut bindings = StageBindings::new();
        let record = ChangeRecord::ChildList {
            target: RemoteId::body(),
            added_nodes: vec![AddedNode::Node(Box::new(skeleton("DIV", "n1")))],
            removed_nodes: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
        };
        apply_record(&mut page, &mut bindings, &record).unwrap();

        let children = page.child_nodes(page.mount());
        assert_eq!(children.len(), 1);
        assert_eq!(page.node_name(children[0]).as_deref(), Some("DIV"));
        assert_eq!(bindings.get(&RemoteId::new("n1")), Some(children[0]));
    }

    #[test]
    fn materialize_registers_every_descendant() {
        let mut page = ArenaPage::new();
        let mut bindings = StageBindings::new();
        let mut root = skeleton("UL", "1");
        let mut item = skeleton("LI", "2");
        item.attributes.push(AttrEntry {
            ns: None,
            name: "class".to_string(),
            value: "row".to_string(),
        });
        item.child_nodes.push(text_skeleton("first", "3"));
        root.child_nodes.push(item);

        let key = materialize(&mut page, &mut bindings, &root).unwrap();
        assert_eq!(bindings.len(), 3);
        assert_eq!(page.text_content(key), "first");
        let item_key = bindings.get(&RemoteId::new("2")).unwrap();
        assert_eq!(page.attribute(item_key, "class"), Some("row"));
    }

    #[test]
    fn attribute_update_leaves_others_alone() {
        let mut page = ArenaPage::new();
        let mut bindings = StageBindings::new();
        let div = page.create_element("div");
        page.set_attribute(div, None, "id", "keep").unwrap();
        page.insert_before(page.mount(), div, None).unwrap();
        bindings.bind(RemoteId::new("n1"), div).unwrap();

        let record = ChangeRecord::Attributes {
            target: RemoteId::new("n1"),
            attribute_name: "class".to_string(),
            attribute_ns: None,
            value: Some("active".to_string()),
            old_value: None,
        };
        apply_record(&mut page, &mut bindings, &record).unwrap();
        assert_eq!(page.attribute(div, "class"), Some("active"));
        assert_eq!(page.attribute(div, "id"), Some("keep"));
    }

    #[test]
    fn removed_nodes_detach_in_reverse_order() {
        let mut page = ArenaPage::new();
        let mut bindings = StageBindings::new();
        let a = page.create_element("i");
        let b = page.create_element("b");
        page.insert_before(page.mount(), a, None).unwrap();
        page.insert_before(page.mount(), b, None).unwrap();
        bindings.bind(RemoteId::new("a"), a).unwrap();
        bindings.bind(RemoteId::new("b"), b).unwrap();

        let record = ChangeRecord::ChildList {
            target: RemoteId::body(),
            added_nodes: Vec::new(),
            removed_nodes: vec![RemoteId::new("a"), RemoteId::new("b")],
            previous_sibling: None,
            next_sibling: None,
        };
        apply_record(&mut page, &mut bindings, &record).unwrap();
        assert!(page.child_nodes(page.mount()).is_empty());
    }

    #[test]
    fn insert_lands_before_the_named_sibling() {
        let mut page = ArenaPage::new();
        let mut bindings = StageBindings::new();
        let existing = page.create_element("p");
        page.insert_before(page.mount(), existing, None).unwrap();
        bindings.bind(RemoteId::new("p"), existing).unwrap();

        let record = ChangeRecord::ChildList {
            target: RemoteId::body(),
            added_nodes: vec![AddedNode::Node(Box::new(skeleton("H1", "h")))],
            removed_nodes: Vec::new(),
            previous_sibling: None,
            next_sibling: Some(RemoteId::new("p")),
        };
        apply_record(&mut page, &mut bindings, &record).unwrap();
        let children = page.child_nodes(page.mount());
        assert_eq!(page.node_name(children[0]).as_deref(), Some("H1"));
        assert_eq!(children[1], existing);
    }

    #[test]
    fn unresolved_target_is_fatal() {
        let mut page = ArenaPage::new();
        let mut bindings = StageBindings::new();
        let record = ChangeRecord::CharacterData {
            target: RemoteId::new("ghost"),
            value: "x".to_string(),
            old_value: None,
        };
        assert!(matches!(
            apply_record(&mut page, &mut bindings, &record),
            Err(ReplayError::UnresolvedTarget(_))
        ));
    }

    #[test]
    fn property_record_sets_imperative_state() {
        let mut page = ArenaPage::new();
        let mut bindings = StageBindings::new();
        let input = page.create_element("input");
        page.insert_before(page.mount(), input, None).unwrap();
        bindings.bind(RemoteId::new("i"), input).unwrap();

        let record = ChangeRecord::Properties {
            target: RemoteId::new("i"),
            property_name: "value".to_string(),
            value: PropValue::Text("typed".to_string()),
            old_value: None,
        };
        apply_record(&mut page, &mut bindings, &record).unwrap();
        assert_eq!(
            page.property(input, "value"),
            Some(&PropValue::Text("typed".to_string()))
        );
    }

    #[test]
    fn known_added_node_reuses_the_existing_stage_node() {
        let mut page = ArenaPage::new();
        let mut bindings = StageBindings::new();
        let aside = page.create_element("aside");
        let div = page.create_element("div");
        page.insert_before(page.mount(), aside, None).unwrap();
        page.insert_before(page.mount(), div, None).unwrap();
        bindings.bind(RemoteId::new("aside"), aside).unwrap();
        bindings.bind(RemoteId::new("div"), div).unwrap();

        // Reparent: remove from body, then add (as a known id) under aside.
        let remove = ChangeRecord::ChildList {
            target: RemoteId::body(),
            added_nodes: Vec::new(),
            removed_nodes: vec![RemoteId::new("div")],
            previous_sibling: None,
            next_sibling: None,
        };
        let add = ChangeRecord::ChildList {
            target: RemoteId::new("aside"),
            added_nodes: vec![AddedNode::Known(RemoteId::new("div"))],
            removed_nodes: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
        };
        apply_record(&mut page, &mut bindings, &remove).unwrap();
        apply_record(&mut page, &mut bindings, &add).unwrap();
        assert_eq!(page.child_nodes(aside), vec![div]);
    }
}
