//! Worker-side emulated document tree.
//!
//! Applications mutate this tree exactly like a real one; every mutation
//! synchronously produces a [`Mutation`] record routed to registered
//! observers. Nothing in this crate knows about the wire format; records
//! reference nodes by local [`NodeId`] and are translated at the
//! serialization layer.

pub mod document;
pub mod event;
pub mod mutation;
pub mod node;

mod observer;

pub use crate::document::{DomError, TreeDocument};
pub use crate::event::{Event, EventHandler, HandlerId};
pub use crate::mutation::{Mutation, MutationKind};
pub use crate::node::{Attribute, NodeId, NodeKind, PropValue, ELEMENT_NODE, DOCUMENT_NODE, TEXT_NODE};
pub use crate::observer::ObserverId;
