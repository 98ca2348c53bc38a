//! Binds identifiers onto an already-rendered subtree.
//!
//! Used once per session, only when pre-rendered content exists. The walk is
//! strict: any structural divergence between the real subtree and the
//! worker's first snapshot is fatal. Patching over a mismatch could corrupt
//! visible content, so hydration halts and reports instead.

use std::fmt;

use proto::{AddedNode, ChangeRecord, NodeSkeleton, RemoteId};

use crate::bindings::StageBindings;
use crate::stage::{Stage, StageKey};

#[derive(Debug)]
pub enum HydrationError {
    /// The first snapshot may only contain childList records.
    UnexpectedRecord,
    /// The snapshot carried no skeleton to pair with the root.
    NoRootSkeleton,
    /// The snapshot carried several top-level skeletons.
    MultipleRoots { count: usize },
    /// The real tree and the snapshot diverge at `path`.
    Structure {
        path: String,
        expected: String,
        found: String,
    },
    /// A node or identifier is already bound to something else.
    AlreadyBound { path: String, id: RemoteId },
}

impl fmt::Display for HydrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HydrationError::UnexpectedRecord => {
                write!(f, "hydration batch contains a non-structural record")
            }
            HydrationError::NoRootSkeleton => write!(f, "hydration batch has no root skeleton"),
            HydrationError::MultipleRoots { count } => {
                write!(f, "hydration batch has {count} top-level skeletons, expected one")
            }
            HydrationError::Structure {
                path,
                expected,
                found,
            } => {
                write!(f, "hydration mismatch at {path}: expected {expected}, found {found}")
            }
            HydrationError::AlreadyBound { path, id } => {
                write!(f, "hydration conflict at {path}: {id} is already bound")
            }
        }
    }
}

impl std::error::Error for HydrationError {}

/// Hydrates the first snapshot against `root`. The batch must be childList
/// records whose added nodes are skeletons, carrying exactly one top-level
/// skeleton, the counterpart of the pre-rendered root.
pub fn hydrate_batch<S: Stage>(
    stage: &S,
    bindings: &mut StageBindings,
    root: StageKey,
    records: &[ChangeRecord],
) -> Result<(), HydrationError> {
    let mut skeletons = Vec::new();
    for record in records {
        let ChangeRecord::ChildList { added_nodes, .. } = record else {
            return Err(HydrationError::UnexpectedRecord);
        };
        for added in added_nodes {
            match added {
                AddedNode::Node(skeleton) => skeletons.push(skeleton.as_ref()),
                AddedNode::Known(_) => return Err(HydrationError::UnexpectedRecord),
            }
        }
    }
    match skeletons.as_slice() {
        [] => Err(HydrationError::NoRootSkeleton),
        [skeleton] => {
            let mut path = vec![skeleton.node_name.clone()];
            hydrate_node_at(stage, bindings, root, skeleton, &mut path)
        }
        many => Err(HydrationError::MultipleRoots { count: many.len() }),
    }
}

/// Hydrates one node and its subtree in lockstep with `skeleton`.
pub fn hydrate_node<S: Stage>(
    stage: &S,
    bindings: &mut StageBindings,
    node: StageKey,
    skeleton: &NodeSkeleton,
) -> Result<(), HydrationError> {
    let mut path = vec![skeleton.node_name.clone()];
    hydrate_node_at(stage, bindings, node, skeleton, &mut path)
}

fn hydrate_node_at<S: Stage>(
    stage: &S,
    bindings: &mut StageBindings,
    node: StageKey,
    skeleton: &NodeSkeleton,
    path: &mut Vec<String>,
) -> Result<(), HydrationError> {
    let mismatch = |expected: String, found: String| HydrationError::Structure {
        path: path.join("/"),
        expected,
        found,
    };

    let Some(node_type) = stage.node_type(node) else {
        return Err(mismatch(
            format!("{} node", skeleton.node_name),
            "no real node".to_string(),
        ));
    };
    if node_type != skeleton.node_type {
        return Err(mismatch(
            format!("node type {}", skeleton.node_type.code()),
            format!("node type {}", node_type.code()),
        ));
    }
    let node_name = stage.node_name(node).unwrap_or_default();
    if !node_name.eq_ignore_ascii_case(&skeleton.node_name) {
        return Err(mismatch(skeleton.node_name.clone(), node_name));
    }
    let children = stage.child_nodes(node);
    if children.len() != skeleton.child_nodes.len() {
        return Err(mismatch(
            format!("{} children", skeleton.child_nodes.len()),
            format!("{} children", children.len()),
        ));
    }

    match bindings.get(&skeleton.id) {
        // Re-hydrating the same pairing is a no-op.
        Some(existing) if existing == node => {}
        Some(_) => {
            return Err(HydrationError::AlreadyBound {
                path: path.join("/"),
                id: skeleton.id.clone(),
            });
        }
        None => {
            if bindings.is_bound_key(node) {
                return Err(HydrationError::AlreadyBound {
                    path: path.join("/"),
                    id: skeleton.id.clone(),
                });
            }
            bindings
                .bind(skeleton.id.clone(), node)
                .map_err(|_| HydrationError::AlreadyBound {
                    path: path.join("/"),
                    id: skeleton.id.clone(),
                })?;
        }
    }

    for (index, (child, child_skeleton)) in
        children.iter().zip(&skeleton.child_nodes).enumerate()
    {
        path.push(format!("{}[{index}]", child_skeleton.node_name));
        hydrate_node_at(stage, bindings, *child, child_skeleton, path)?;
        path.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ArenaPage;
    use crate::stage::Stage;
    use proto::NodeType;

    fn skeleton(name: &str, id: &str, children: Vec<NodeSkeleton>) -> NodeSkeleton {
        NodeSkeleton {
            node_type: NodeType::Element,
            node_name: name.to_string(),
            id: RemoteId::new(id),
            attributes: Vec::new(),
            style: Vec::new(),
            class_name: None,
            data: None,
            child_nodes: children,
        }
    }

    fn text(data: &str, id: &str) -> NodeSkeleton {
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

    /// Builds the pre-rendered counterpart: <div><p>#text</p></div>
    fn prerendered(page: &mut ArenaPage) -> StageKey {
        let root = page.create_element("div");
        let p = page.create_element("p");
        let t = page.create_text("hello");
        page.insert_before(page.mount(), root, None).unwrap();
        page.insert_before(root, p, None).unwrap();
        page.insert_before(p, t, None).unwrap();
        root
    }

    fn matching_snapshot() -> NodeSkeleton {
        skeleton(
            "DIV",
            "1",
            vec![skeleton("P", "2", vec![text("hello", "3")])],
        )
    }

    #[test]
    fn binds_without_creating() {
        let mut page = ArenaPage::new();
        let root = prerendered(&mut page);
        let node_count_before = page.child_nodes(page.mount()).len();
        let mut bindings = StageBindings::new();

        hydrate_node(&page, &mut bindings, root, &matching_snapshot()).unwrap();
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings.get(&RemoteId::new("1")), Some(root));
        assert_eq!(page.child_nodes(page.mount()).len(), node_count_before);
    }

    #[test]
    fn rehydrating_the_same_pairing_is_idempotent() {
        let mut page = ArenaPage::new();
        let root = prerendered(&mut page);
        let mut bindings = StageBindings::new();
        let snapshot = matching_snapshot();

        hydrate_node(&page, &mut bindings, root, &snapshot).unwrap();
        let structure_before = page.child_nodes(root).clone();
        hydrate_node(&page, &mut bindings, root, &snapshot).unwrap();
        assert_eq!(page.child_nodes(root), structure_before);
        assert_eq!(bindings.len(), 3);
    }

    #[test]
    fn name_mismatch_is_fatal() {
        let mut page = ArenaPage::new();
        let root = prerendered(&mut page);
        let mut bindings = StageBindings::new();
        let snapshot = skeleton(
            "SECTION",
            "1",
            vec![skeleton("P", "2", vec![text("hello", "3")])],
        );

        let err = hydrate_node(&page, &mut bindings, root, &snapshot).unwrap_err();
        assert!(matches!(err, HydrationError::Structure { .. }));
        // Nothing was bound along the failed walk's prefix either.
        assert!(bindings.is_empty());
    }

    #[test]
    fn child_count_mismatch_is_fatal_and_reports_the_path() {
        let mut page = ArenaPage::new();
        let root = prerendered(&mut page);
        let mut bindings = StageBindings::new();
        let snapshot = skeleton(
            "DIV",
            "1",
            vec![skeleton("P", "2", vec![text("hello", "3"), text("extra", "4")])],
        );

        let err = hydrate_node(&page, &mut bindings, root, &snapshot).unwrap_err();
        match err {
            HydrationError::Structure { path, .. } => assert_eq!(path, "DIV/P[0]"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn batch_requires_exactly_one_root_skeleton() {
        let mut page = ArenaPage::new();
        let root = prerendered(&mut page);
        let mut bindings = StageBindings::new();

        let record = ChangeRecord::ChildList {
            target: RemoteId::body(),
            added_nodes: vec![
                AddedNode::Node(Box::new(matching_snapshot())),
                AddedNode::Node(Box::new(skeleton("DIV", "9", Vec::new()))),
            ],
            removed_nodes: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
        };
        let err = hydrate_batch(&page, &mut bindings, root, &[record]).unwrap_err();
        assert!(matches!(err, HydrationError::MultipleRoots { count: 2 }));
    }

    #[test]
    fn batch_rejects_non_structural_records() {
        let mut page = ArenaPage::new();
        let root = prerendered(&mut page);
        let mut bindings = StageBindings::new();

        let record = ChangeRecord::CharacterData {
            target: RemoteId::new("1"),
            value: "x".to_string(),
            old_value: None,
        };
        let err = hydrate_batch(&page, &mut bindings, root, &[record]).unwrap_err();
        assert!(matches!(err, HydrationError::UnexpectedRecord));
    }
}
