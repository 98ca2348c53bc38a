//! The real display tree, as far as replay is concerned.
//!
//! Embedders implement [`Stage`] over whatever owns their visuals;
//! [`ArenaPage`](crate::ArenaPage) is the in-tree implementation. Mutators
//! must fail loudly on unknown keys: a dangling key means the identifier
//! mapping upstream is broken, and silently ignoring it would let the two
//! trees diverge.

use std::fmt;

use core_types::Rect;
use proto::{NodeType, PropValue};

/// Handle to one node of the real tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageKey(pub u32);

#[derive(Debug, PartialEq, Eq)]
pub enum StageError {
    UnknownKey(StageKey),
    NotAChild { parent: StageKey, child: StageKey },
    MissingReference { parent: StageKey, reference: StageKey },
    InvalidParent(StageKey),
    CycleDetected { parent: StageKey, child: StageKey },
    WrongKind(StageKey),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::UnknownKey(key) => write!(f, "unknown stage key {key:?}"),
            StageError::NotAChild { parent, child } => {
                write!(f, "node {child:?} is not a child of {parent:?}")
            }
            StageError::MissingReference { parent, reference } => {
                write!(f, "reference {reference:?} is not a child of {parent:?}")
            }
            StageError::InvalidParent(key) => write!(f, "node {key:?} cannot have children"),
            StageError::CycleDetected { parent, child } => {
                write!(f, "inserting {child:?} under {parent:?} would create a cycle")
            }
            StageError::WrongKind(key) => write!(f, "operation does not apply to node {key:?}"),
        }
    }
}

impl std::error::Error for StageError {}

pub trait Stage {
    /// The configured mount element; body-targeted records land here.
    fn mount(&self) -> StageKey;

    fn create_element(&mut self, name: &str) -> StageKey;
    fn create_text(&mut self, data: &str) -> StageKey;

    /// Inserts `child` before `reference`, or appends when `reference` is
    /// `None`. Detaches `child` from any previous parent first.
    fn insert_before(
        &mut self,
        parent: StageKey,
        child: StageKey,
        reference: Option<StageKey>,
    ) -> Result<(), StageError>;
    fn remove_child(&mut self, parent: StageKey, child: StageKey) -> Result<(), StageError>;

    fn set_attribute(
        &mut self,
        key: StageKey,
        ns: Option<&str>,
        name: &str,
        value: &str,
    ) -> Result<(), StageError>;
    fn remove_attribute(
        &mut self,
        key: StageKey,
        ns: Option<&str>,
        name: &str,
    ) -> Result<(), StageError>;
    fn set_text(&mut self, key: StageKey, value: &str) -> Result<(), StageError>;
    fn set_style(&mut self, key: StageKey, name: &str, value: &str) -> Result<(), StageError>;
    fn set_property(
        &mut self,
        key: StageKey,
        name: &str,
        value: &PropValue,
    ) -> Result<(), StageError>;

    // Structural readback, for hydration and the viewport policy.
    fn node_type(&self, key: StageKey) -> Option<NodeType>;
    fn node_name(&self, key: StageKey) -> Option<String>;
    fn parent(&self, key: StageKey) -> Option<StageKey>;
    fn child_nodes(&self, key: StageKey) -> Vec<StageKey>;

    /// Current layout box, when the embedder knows one. `None` means the
    /// node is treated as visible.
    fn bounding_box(&self, key: StageKey) -> Option<Rect>;
}
