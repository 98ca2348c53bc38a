//! Input-event descriptors forwarded from the privileged side.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::{PropValue, RemoteId};

/// Minimal, transmission-safe description of one input event.
///
/// `fields` is the flattened bag of primitive-valued, enumerable properties
/// of the originating event; constants, functions and nested objects never
/// make it in. `value_update` carries the current form-control value for
/// change events so the worker tree can catch up before dispatch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptor {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RemoteId>,
    #[serde(rename = "__value", default, skip_serializing_if = "Option::is_none")]
    pub value_update: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, PropValue>,
}

impl EventDescriptor {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Self::default()
        }
    }
}
