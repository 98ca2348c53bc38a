//! Wire vocabulary for the tree synchronization protocol.
//!
//! Everything in this crate crosses the realm boundary and therefore has a
//! stable JSON form. Local tree handles never appear here; nodes are always
//! referred to by [`RemoteId`] or carried as a [`NodeSkeleton`].

pub mod codec;
pub mod events;
pub mod messages;
pub mod records;

pub use crate::codec::{
    CodecError, decode_skeleton, decode_to_host, decode_to_worker, encode_skeleton, encode_to_host,
    encode_to_worker,
};
pub use crate::events::EventDescriptor;
pub use crate::messages::{Millis, ToHost, ToWorker};
pub use crate::records::{AddedNode, AttrEntry, ChangeRecord, NodeSkeleton, NodeType, PropValue, RemoteId};
