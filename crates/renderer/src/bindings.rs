use std::collections::HashMap;
use std::fmt;

use proto::RemoteId;

use crate::stage::StageKey;

/// Main-thread identifier registry, one per session.
///
/// The mapping is bijective: an identifier binds to exactly one stage node
/// and vice versa, for the lifetime of the node. Entries are not retracted
/// on removal, so late records targeting detached nodes still resolve.
pub struct StageBindings {
    by_id: HashMap<RemoteId, StageKey>,
    by_key: HashMap<StageKey, RemoteId>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum BindError {
    IdBound { id: RemoteId, existing: StageKey },
    KeyBound { key: StageKey, existing: RemoteId },
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::IdBound { id, existing } => {
                write!(f, "identifier {id} is already bound to {existing:?}")
            }
            BindError::KeyBound { key, existing } => {
                write!(f, "stage node {key:?} is already bound to {existing}")
            }
        }
    }
}

impl std::error::Error for BindError {}

impl StageBindings {
    pub fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    /// Binds `id` to `key`. Re-binding the identical pair is a no-op;
    /// anything else is a consistency violation.
    pub fn bind(&mut self, id: RemoteId, key: StageKey) -> Result<(), BindError> {
        match self.by_id.get(&id) {
            Some(existing) if *existing == key => return Ok(()),
            Some(existing) => {
                return Err(BindError::IdBound {
                    id,
                    existing: *existing,
                });
            }
            None => {}
        }
        if let Some(existing) = self.by_key.get(&key) {
            return Err(BindError::KeyBound {
                key,
                existing: existing.clone(),
            });
        }
        self.by_key.insert(key, id.clone());
        self.by_id.insert(id, key);
        Ok(())
    }

    pub fn get(&self, id: &RemoteId) -> Option<StageKey> {
        self.by_id.get(id).copied()
    }

    /// Resolves an identifier; the body marker resolves to `mount`.
    pub fn resolve(&self, id: &RemoteId, mount: StageKey) -> Option<StageKey> {
        if id.is_body() {
            return Some(mount);
        }
        self.get(id)
    }

    pub fn id_of(&self, key: StageKey) -> Option<&RemoteId> {
        self.by_key.get(&key)
    }

    pub fn is_bound_key(&self, key: StageKey) -> bool {
        self.by_key.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Default for StageBindings {
    fn default() -> Self {
        Self::new()
    }
}
