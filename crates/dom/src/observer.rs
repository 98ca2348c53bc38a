use crate::mutation::Mutation;
use crate::node::NodeId;

/// Handle to one registered observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObserverId(pub(crate) usize);

#[derive(Debug)]
pub(crate) struct ObserverState {
    pub(crate) target: NodeId,
    pub(crate) subtree: bool,
    pub(crate) records: Vec<Mutation>,
    pub(crate) connected: bool,
}
