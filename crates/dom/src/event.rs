use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::document::TreeDocument;
use crate::node::{NodeId, PropValue};

/// Handle returned by `add_event_listener`, used for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandlerId(pub(crate) u64);

/// Handlers receive the owning document so they can mutate the tree from
/// inside the callback.
pub type EventHandler = Rc<RefCell<dyn FnMut(&mut TreeDocument, &mut Event)>>;

/// An event dispatched against the emulated tree.
#[derive(Debug)]
pub struct Event {
    pub event_type: String,
    pub bubbles: bool,
    pub cancelable: bool,
    pub target: Option<NodeId>,
    pub current_target: Option<NodeId>,
    pub default_prevented: bool,
    /// Flattened primitive payload carried over from the originating event.
    pub fields: BTreeMap<String, PropValue>,
    stop: bool,
    stop_immediate: bool,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            bubbles: false,
            cancelable: false,
            target: None,
            current_target: None,
            default_prevented: false,
            fields: BTreeMap::new(),
            stop: false,
            stop_immediate: false,
        }
    }

    /// An event that bubbles, the shape redispatched input events take.
    pub fn bubbling(event_type: impl Into<String>) -> Self {
        let mut event = Self::new(event_type);
        event.bubbles = true;
        event
    }

    pub fn stop_propagation(&mut self) {
        self.stop = true;
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.stop = true;
        self.stop_immediate = true;
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub(crate) fn propagation_stopped(&self) -> bool {
        self.stop
    }

    pub(crate) fn immediately_stopped(&self) -> bool {
        self.stop_immediate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn doc_with_chain() -> (TreeDocument, NodeId, NodeId) {
        let mut doc = TreeDocument::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("button");
        doc.append_child(doc.body(), outer).unwrap();
        doc.append_child(outer, inner).unwrap();
        (doc, outer, inner)
    }

    #[test]
    fn bubbles_in_order_target_first() {
        let (mut doc, outer, inner) = doc_with_chain();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = seen.clone();
        doc.add_event_listener(inner, "click", move |_, _| log.borrow_mut().push("inner"));
        let log = seen.clone();
        doc.add_event_listener(outer, "click", move |_, _| log.borrow_mut().push("outer"));
        let log = seen.clone();
        doc.add_event_listener(doc.body(), "click", move |_, _| log.borrow_mut().push("body"));

        let mut event = Event::bubbling("click");
        assert!(doc.dispatch_event(inner, &mut event));
        assert_eq!(*seen.borrow(), vec!["inner", "outer", "body"]);
        assert_eq!(event.target, Some(inner));
    }

    #[test]
    fn stop_propagation_halts_ancestors_but_not_siblings() {
        let (mut doc, outer, inner) = doc_with_chain();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = seen.clone();
        doc.add_event_listener(inner, "click", move |_, event| {
            log.borrow_mut().push("first");
            event.stop_propagation();
        });
        let log = seen.clone();
        doc.add_event_listener(inner, "click", move |_, _| log.borrow_mut().push("second"));
        let log = seen.clone();
        doc.add_event_listener(outer, "click", move |_, _| log.borrow_mut().push("outer"));

        let mut event = Event::bubbling("click");
        doc.dispatch_event(inner, &mut event);
        assert_eq!(*seen.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn stop_immediate_halts_remaining_handlers() {
        let (mut doc, _outer, inner) = doc_with_chain();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = seen.clone();
        doc.add_event_listener(inner, "click", move |_, event| {
            log.borrow_mut().push("first");
            event.stop_immediate_propagation();
        });
        let log = seen.clone();
        doc.add_event_listener(inner, "click", move |_, _| log.borrow_mut().push("second"));

        let mut event = Event::bubbling("click");
        doc.dispatch_event(inner, &mut event);
        assert_eq!(*seen.borrow(), vec!["first"]);
    }

    #[test]
    fn prevent_default_reflected_in_return() {
        let (mut doc, _outer, inner) = doc_with_chain();
        doc.add_event_listener(inner, "click", |_, event| event.prevent_default());
        let mut event = Event::bubbling("click");
        assert!(!doc.dispatch_event(inner, &mut event));
    }

    #[test]
    fn non_bubbling_event_stays_on_target() {
        let (mut doc, outer, inner) = doc_with_chain();
        let seen = Rc::new(RefCell::new(0));
        let count = seen.clone();
        doc.add_event_listener(outer, "focus", move |_, _| *count.borrow_mut() += 1);

        let mut event = Event::new("focus");
        doc.dispatch_event(inner, &mut event);
        assert_eq!(*seen.borrow(), 0);
    }

    #[test]
    fn handler_may_mutate_the_tree() {
        let (mut doc, outer, inner) = doc_with_chain();
        doc.add_event_listener(inner, "click", move |doc, _| {
            let text = doc.create_text("clicked");
            doc.append_child(outer, text).unwrap();
        });
        let mut event = Event::bubbling("click");
        doc.dispatch_event(inner, &mut event);
        assert_eq!(doc.children(outer).len(), 2);
    }

    #[test]
    fn removed_listener_no_longer_fires() {
        let (mut doc, _outer, inner) = doc_with_chain();
        let seen = Rc::new(RefCell::new(0));
        let count = seen.clone();
        let id = doc.add_event_listener(inner, "click", move |_, _| *count.borrow_mut() += 1);
        doc.remove_event_listener(inner, "click", id);

        let mut event = Event::bubbling("click");
        doc.dispatch_event(inner, &mut event);
        assert_eq!(*seen.borrow(), 0);
    }
}
