//! Forward path: real input events become minimal descriptors.

use std::collections::BTreeMap;

use proto::{EventDescriptor, PropValue};

use crate::bindings::StageBindings;
use crate::stage::StageKey;

/// Event types observed at the document root and forwarded to the worker.
pub const PROXIED_EVENTS: &[&str] = &["change", "click", "focus", "touchstart", "touchend"];

/// A fast touch-start/touch-end pair within this distance (in
/// device-independent pixels) is recognized as a click.
const TAP_DISTANCE: f64 = 10.0;

/// Input event as the embedder observed it on the real tree.
#[derive(Clone, Debug, Default)]
pub struct StageEvent {
    pub event_type: String,
    pub target: Option<StageKey>,
    /// Own enumerable fields of the originating event. Constants
    /// (all-uppercase names) and reserved keys are filtered during capture.
    pub fields: BTreeMap<String, PropValue>,
    /// Current form-control value, for change events.
    pub value: Option<String>,
    pub page_x: Option<f64>,
    pub page_y: Option<f64>,
}

impl StageEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Self::default()
        }
    }
}

/// Builds descriptors from observed events, coalescing tap gestures into
/// synthesized clicks.
pub struct EventCapture {
    touch_start: Option<(f64, f64)>,
    suppress_click: bool,
}

impl EventCapture {
    pub fn new() -> Self {
        Self {
            touch_start: None,
            suppress_click: false,
        }
    }

    /// Returns the descriptors to forward for this event: usually one, two
    /// when a tap synthesizes a click, none when the event is not proxied or
    /// is the native click following a synthesized one.
    pub fn capture(&mut self, event: &StageEvent, bindings: &StageBindings) -> Vec<EventDescriptor> {
        if !PROXIED_EVENTS.contains(&event.event_type.as_str()) {
            return Vec::new();
        }
        if event.event_type == "click" && self.suppress_click {
            self.suppress_click = false;
            log::debug!("suppressing native click after synthesized tap click");
            return Vec::new();
        }

        let mut out = vec![build_descriptor(event, bindings, &event.event_type)];

        match event.event_type.as_str() {
            "touchstart" => {
                self.touch_start = touch_point(event);
            }
            "touchend" => {
                if let (Some(start), Some(end)) = (self.touch_start.take(), touch_point(event)) {
                    let distance = ((end.0 - start.0).powi(2) + (end.1 - start.1).powi(2)).sqrt();
                    if distance < TAP_DISTANCE {
                        out.push(build_descriptor(event, bindings, "click"));
                        self.suppress_click = true;
                    }
                }
            }
            _ => {}
        }
        out
    }
}

impl Default for EventCapture {
    fn default() -> Self {
        Self::new()
    }
}

fn build_descriptor(
    event: &StageEvent,
    bindings: &StageBindings,
    event_type: &str,
) -> EventDescriptor {
    let mut descriptor = EventDescriptor::new(event_type);
    descriptor.target = event.target.and_then(|key| bindings.id_of(key).cloned());
    for (name, value) in &event.fields {
        if is_constant_name(name) || name == "type" || name == "target" || name.starts_with("__") {
            continue;
        }
        descriptor.fields.insert(name.clone(), value.clone());
    }
    if let Some(x) = event.page_x {
        descriptor
            .fields
            .insert("pageX".to_string(), PropValue::Number(x));
    }
    if let Some(y) = event.page_y {
        descriptor
            .fields
            .insert("pageY".to_string(), PropValue::Number(y));
    }
    if event.event_type == "change" {
        descriptor.value_update = event.value.clone();
    }
    descriptor
}

/// Constants keep their all-uppercase names; everything an app cares about
/// has at least one lowercase character.
fn is_constant_name(name: &str) -> bool {
    !name.is_empty() && name == name.to_ascii_uppercase()
}

fn touch_point(event: &StageEvent) -> Option<(f64, f64)> {
    Some((event.page_x?, event.page_y?))
}
