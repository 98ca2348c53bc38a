//! Change records and node skeletons.
//!
//! Invariants:
//! - Records are applied in the order they were captured.
//! - A record is consumed exactly once; it is never retained or replayed.
//! - `RemoteId` values are minted once, on the worker side, the first time a
//!   node crosses the boundary, and are immutable for the node's lifetime.
//! - The document body is addressed by the fixed `#body` marker and never by
//!   a minted identifier.
//! - An added-node entry is a bare identifier when the receiving side already
//!   knows the node, and a full recursive skeleton otherwise.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque identifier for a synchronized node, unique per session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    /// Well-known marker for the document body / mount root.
    pub const BODY_MARK: &'static str = "#body";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn body() -> Self {
        Self(Self::BODY_MARK.to_string())
    }

    pub fn is_body(&self) -> bool {
        self.0 == Self::BODY_MARK
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Node kind, serialized with the conventional numeric codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Text,
    Document,
}

impl NodeType {
    pub fn code(self) -> u8 {
        match self {
            NodeType::Element => 1,
            NodeType::Text => 3,
            NodeType::Document => 9,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(NodeType::Element),
            3 => Some(NodeType::Text),
            9 => Some(NodeType::Document),
            _ => None,
        }
    }
}

impl Serialize for NodeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for NodeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        NodeType::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown node type code {code}")))
    }
}

/// One attribute, optionally namespace-qualified.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttrEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ns: Option<String>,
    pub name: String,
    pub value: String,
}

/// Primitive value carried by property records and event fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropValue {
    /// String form used when a property is mirrored onto an attribute.
    pub fn to_attr_string(&self) -> String {
        match self {
            PropValue::Bool(b) => b.to_string(),
            PropValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            PropValue::Text(s) => s.clone(),
        }
    }
}

/// Fully serialized snapshot of a node and its descendants, sufficient to
/// materialize it from scratch on the receiving side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSkeleton {
    pub node_type: NodeType,
    pub node_name: String,
    #[serde(rename = "__id")]
    pub id: RemoteId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttrEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub style: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Text content; present for text nodes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_nodes: Vec<NodeSkeleton>,
}

/// Entry in a childList added-node list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddedNode {
    Known(RemoteId),
    Node(Box<NodeSkeleton>),
}

impl AddedNode {
    pub fn id(&self) -> &RemoteId {
        match self {
            AddedNode::Known(id) => id,
            AddedNode::Node(skeleton) => &skeleton.id,
        }
    }
}

/// One captured mutation, tagged the way mutation records are on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChangeRecord {
    ChildList {
        target: RemoteId,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        added_nodes: Vec<AddedNode>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        removed_nodes: Vec<RemoteId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_sibling: Option<RemoteId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next_sibling: Option<RemoteId>,
    },
    Attributes {
        target: RemoteId,
        attribute_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute_ns: Option<String>,
        /// `None` means the attribute was removed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_value: Option<String>,
    },
    CharacterData {
        target: RemoteId,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_value: Option<String>,
    },
    Properties {
        target: RemoteId,
        property_name: String,
        value: PropValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_value: Option<PropValue>,
    },
}

impl ChangeRecord {
    pub fn target(&self) -> &RemoteId {
        match self {
            ChangeRecord::ChildList { target, .. }
            | ChangeRecord::Attributes { target, .. }
            | ChangeRecord::CharacterData { target, .. }
            | ChangeRecord::Properties { target, .. } => target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_record_wire_tags() {
        let record = ChangeRecord::Attributes {
            target: RemoteId::new("7"),
            attribute_name: "class".to_string(),
            attribute_ns: None,
            value: Some("active".to_string()),
            old_value: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "attributes");
        assert_eq!(json["target"], "7");
        assert_eq!(json["attributeName"], "class");
        assert!(json.get("attributeNs").is_none());
    }

    #[test]
    fn added_node_distinguishes_id_from_skeleton() {
        let known: AddedNode = serde_json::from_str("\"12\"").unwrap();
        assert_eq!(known, AddedNode::Known(RemoteId::new("12")));

        let skeleton: AddedNode = serde_json::from_str(
            r#"{"nodeType":1,"nodeName":"DIV","__id":"n1"}"#,
        )
        .unwrap();
        match skeleton {
            AddedNode::Node(node) => {
                assert_eq!(node.node_type, NodeType::Element);
                assert_eq!(node.node_name, "DIV");
                assert_eq!(node.id, RemoteId::new("n1"));
                assert!(node.child_nodes.is_empty());
            }
            AddedNode::Known(_) => panic!("expected skeleton"),
        }
    }

    #[test]
    fn skeleton_round_trip() {
        let skeleton = NodeSkeleton {
            node_type: NodeType::Element,
            node_name: "UL".to_string(),
            id: RemoteId::new("3"),
            attributes: vec![AttrEntry {
                ns: None,
                name: "class".to_string(),
                value: "list".to_string(),
            }],
            style: vec![("color".to_string(), "red".to_string())],
            class_name: None,
            data: None,
            child_nodes: vec![NodeSkeleton {
                node_type: NodeType::Text,
                node_name: "#text".to_string(),
                id: RemoteId::new("4"),
                attributes: Vec::new(),
                style: Vec::new(),
                class_name: None,
                data: Some("hi".to_string()),
                child_nodes: Vec::new(),
            }],
        };
        let json = serde_json::to_string(&skeleton).unwrap();
        let back: NodeSkeleton = serde_json::from_str(&json).unwrap();
        assert_eq!(skeleton, back);
    }

    #[test]
    fn body_marker_is_reserved() {
        assert!(RemoteId::body().is_body());
        assert!(!RemoteId::new("body").is_body());
    }

    #[test]
    fn prop_value_untagged_forms() {
        assert_eq!(
            serde_json::from_str::<PropValue>("true").unwrap(),
            PropValue::Bool(true)
        );
        assert_eq!(
            serde_json::from_str::<PropValue>("2.5").unwrap(),
            PropValue::Number(2.5)
        );
        assert_eq!(
            serde_json::from_str::<PropValue>("\"x\"").unwrap(),
            PropValue::Text("x".to_string())
        );
    }
}
