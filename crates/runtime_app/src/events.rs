//! Reverse path: forwarded input events are redispatched against the
//! emulated tree.

use dom::{DomError, Event, TreeDocument};
use proto::EventDescriptor;

use crate::registry::NodeIds;
use crate::sanitize::prop_from_wire;

/// Resolves the descriptor's target (falling back to the body for
/// window-level events), applies any form-control value update, and
/// dispatches a bubbling event. Returns `false` when a handler prevented the
/// default action.
pub fn redispatch(
    doc: &mut TreeDocument,
    ids: &NodeIds,
    descriptor: &EventDescriptor,
) -> Result<bool, DomError> {
    let target = descriptor
        .target
        .as_ref()
        .and_then(|id| ids.resolve(doc, id))
        .unwrap_or_else(|| doc.body());

    if let Some(value) = &descriptor.value_update {
        doc.set_property(target, "value", dom::PropValue::Text(value.clone()))?;
    }

    let mut event = Event::bubbling(&descriptor.event_type);
    for (name, value) in &descriptor.fields {
        event.fields.insert(name.clone(), prop_from_wire(value));
    }
    Ok(doc.dispatch_event(target, &mut event))
}
