use crate::node::{NodeId, PropValue};

/// One captured change, created synchronously at the moment of mutation.
#[derive(Clone, Debug, PartialEq)]
pub struct Mutation {
    pub target: NodeId,
    pub kind: MutationKind,
}

/// Minimal delta for one mutation. Node references stay local handles here;
/// identifier assignment happens when a record crosses the boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum MutationKind {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
        previous_sibling: Option<NodeId>,
        next_sibling: Option<NodeId>,
    },
    Attributes {
        name: String,
        ns: Option<String>,
        /// `None` means the attribute was removed.
        value: Option<String>,
        old_value: Option<String>,
    },
    CharacterData {
        value: String,
        old_value: String,
    },
    Properties {
        name: String,
        value: PropValue,
        old_value: Option<PropValue>,
    },
}
