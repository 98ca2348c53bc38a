pub type NodeIndex = u32;

/// Handle into one [`TreeDocument`](crate::TreeDocument)'s arena. Handles are
/// only meaningful for the document that minted them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub NodeIndex);

pub const ELEMENT_NODE: u8 = 1;
pub const TEXT_NODE: u8 = 3;
pub const DOCUMENT_NODE: u8 = 9;

/// One attribute, optionally namespace-qualified. Attribute names match
/// case-insensitively within a namespace.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub ns: Option<String>,
    pub name: String,
    pub value: String,
}

/// Value of an observable element property.
#[derive(Clone, Debug, PartialEq)]
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

#[derive(Debug)]
pub enum NodeKind {
    Document,
    Element {
        name: String,
        attributes: Vec<Attribute>,
        style: Vec<(String, String)>,
        properties: Vec<(String, PropValue)>,
    },
    Text {
        data: String,
    },
}

impl NodeKind {
    pub fn node_type(&self) -> u8 {
        match self {
            NodeKind::Document => DOCUMENT_NODE,
            NodeKind::Element { .. } => ELEMENT_NODE,
            NodeKind::Text { .. } => TEXT_NODE,
        }
    }

    pub fn node_name(&self) -> &str {
        match self {
            NodeKind::Document => "#document",
            NodeKind::Element { name, .. } => name,
            NodeKind::Text { .. } => "#text",
        }
    }

    pub fn allows_children(&self) -> bool {
        matches!(self, NodeKind::Document | NodeKind::Element { .. })
    }
}
