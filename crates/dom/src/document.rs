use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::event::{Event, EventHandler, HandlerId};
use crate::mutation::{Mutation, MutationKind};
use crate::node::{Attribute, NodeId, NodeKind, PropValue};
use crate::observer::{ObserverId, ObserverState};

/// Structural misuse of the tree. These indicate a broken node reference
/// upstream and are never silently ignored.
#[derive(Debug, PartialEq, Eq)]
pub enum DomError {
    NotAChild { parent: NodeId, child: NodeId },
    MissingReference { parent: NodeId, reference: NodeId },
    InvalidParent(NodeId),
    CycleDetected { parent: NodeId, child: NodeId },
    NotAnElement(NodeId),
    NotAText(NodeId),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::NotAChild { parent, child } => {
                write!(f, "node {child:?} is not a child of {parent:?}")
            }
            DomError::MissingReference { parent, reference } => {
                write!(f, "reference node {reference:?} is not a child of {parent:?}")
            }
            DomError::InvalidParent(id) => write!(f, "node {id:?} cannot have children"),
            DomError::CycleDetected { parent, child } => {
                write!(f, "inserting {child:?} under {parent:?} would create a cycle")
            }
            DomError::NotAnElement(id) => write!(f, "node {id:?} is not an element"),
            DomError::NotAText(id) => write!(f, "node {id:?} is not a text node"),
        }
    }
}

impl std::error::Error for DomError {}

#[derive(Debug)]
struct NodeEntry {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed emulated document.
///
/// The document and its body element exist from construction. Entries are
/// never deallocated while the document lives, so a handle stays resolvable
/// after removal from the tree; detached subtrees simply become unreachable.
pub struct TreeDocument {
    nodes: Vec<NodeEntry>,
    root: NodeId,
    body: NodeId,
    observers: Vec<ObserverState>,
    handlers: HashMap<NodeId, HashMap<String, Vec<(HandlerId, EventHandler)>>>,
    next_handler: u64,
}

impl TreeDocument {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            observers: Vec::new(),
            handlers: HashMap::new(),
            next_handler: 0,
        };
        doc.root = doc.alloc(NodeKind::Document);
        doc.body = doc.alloc(NodeKind::Element {
            name: "BODY".to_string(),
            attributes: Vec::new(),
            style: Vec::new(),
            properties: Vec::new(),
        });
        let (root, body) = (doc.root, doc.body);
        doc.nodes[root.0 as usize].children.push(body);
        doc.nodes[body.0 as usize].parent = Some(root);
        doc
    }

    pub fn document(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeEntry {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn entry(&self, id: NodeId) -> &NodeEntry {
        &self.nodes[id.0 as usize]
    }

    fn entry_mut(&mut self, id: NodeId) -> &mut NodeEntry {
        &mut self.nodes[id.0 as usize]
    }

    // ---- node construction -------------------------------------------------

    /// Creates a detached element. Element names are stored uppercase.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.alloc(NodeKind::Element {
            name: name.to_ascii_uppercase(),
            attributes: Vec::new(),
            style: Vec::new(),
            properties: Vec::new(),
        })
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, data: &str) -> NodeId {
        self.alloc(NodeKind::Text {
            data: data.to_string(),
        })
    }

    // ---- accessors ---------------------------------------------------------

    pub fn node_kind(&self, id: NodeId) -> &NodeKind {
        &self.entry(id).kind
    }

    pub fn node_type(&self, id: NodeId) -> u8 {
        self.entry(id).kind.node_type()
    }

    pub fn node_name(&self, id: NodeId) -> &str {
        self.entry(id).kind.node_name()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.entry(id).children
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.entry(id).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attribute_ns(id, None, name)
    }

    pub fn attribute_ns(&self, id: NodeId, ns: Option<&str>, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|attr| attr.ns.as_deref() == ns && attr.name.eq_ignore_ascii_case(name))
            .map(|attr| attr.value.as_str())
    }

    pub fn style(&self, id: NodeId) -> &[(String, String)] {
        match &self.entry(id).kind {
            NodeKind::Element { style, .. } => style,
            _ => &[],
        }
    }

    pub fn properties(&self, id: NodeId) -> &[(String, PropValue)] {
        match &self.entry(id).kind {
            NodeKind::Element { properties, .. } => properties,
            _ => &[],
        }
    }

    pub fn property(&self, id: NodeId, name: &str) -> Option<&PropValue> {
        self.properties(id)
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.entry(id).kind {
            NodeKind::Text { data } => Some(data),
            _ => None,
        }
    }

    /// Concatenated text of the node's subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        fn walk(doc: &TreeDocument, id: NodeId, out: &mut String) {
            match &doc.entry(id).kind {
                NodeKind::Text { data } => out.push_str(data),
                _ => {
                    for child in &doc.entry(id).children {
                        walk(doc, *child, out);
                    }
                }
            }
        }
        let mut out = String::new();
        walk(self, id, &mut out);
        out
    }

    // ---- structural mutation ----------------------------------------------

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check_insertable(parent, child)?;
        self.detach(child)?;
        self.entry_mut(parent).children.push(child);
        self.entry_mut(child).parent = Some(parent);
        let children = &self.entry(parent).children;
        let previous_sibling = if children.len() >= 2 {
            Some(children[children.len() - 2])
        } else {
            None
        };
        self.record(
            parent,
            MutationKind::ChildList {
                added: vec![child],
                removed: Vec::new(),
                previous_sibling,
                next_sibling: None,
            },
        );
        Ok(())
    }

    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let Some(reference) = reference else {
            return self.append_child(parent, child);
        };
        self.check_insertable(parent, child)?;
        if self.entry(reference).parent != Some(parent) {
            return Err(DomError::MissingReference { parent, reference });
        }
        self.detach(child)?;
        // Membership may have changed if the reference was the detached node.
        let pos = self
            .entry(parent)
            .children
            .iter()
            .position(|id| *id == reference)
            .ok_or(DomError::MissingReference { parent, reference })?;
        self.entry_mut(parent).children.insert(pos, child);
        self.entry_mut(child).parent = Some(parent);
        self.record(
            parent,
            MutationKind::ChildList {
                added: vec![child],
                removed: Vec::new(),
                previous_sibling: None,
                next_sibling: Some(reference),
            },
        );
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.entry(child).parent != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        let pos = self
            .entry(parent)
            .children
            .iter()
            .position(|id| *id == child)
            .ok_or(DomError::NotAChild { parent, child })?;
        self.entry_mut(parent).children.remove(pos);
        self.entry_mut(child).parent = None;
        let children = &self.entry(parent).children;
        let previous_sibling = pos.checked_sub(1).map(|i| children[i]);
        let next_sibling = children.get(pos).copied();
        self.record(
            parent,
            MutationKind::ChildList {
                added: Vec::new(),
                removed: vec![child],
                previous_sibling,
                next_sibling,
            },
        );
        Ok(())
    }

    pub fn replace_child(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        old_child: NodeId,
    ) -> Result<(), DomError> {
        if self.entry(old_child).parent != Some(parent) {
            return Err(DomError::NotAChild {
                parent,
                child: old_child,
            });
        }
        self.insert_before(parent, new_child, Some(old_child))?;
        self.remove_child(parent, old_child)
    }

    /// Removes `child` from its current parent, if any. Insertion paths call
    /// this first so a node is never in two child lists at once.
    fn detach(&mut self, child: NodeId) -> Result<(), DomError> {
        match self.entry(child).parent {
            Some(parent) => self.remove_child(parent, child),
            None => Ok(()),
        }
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if !self.entry(parent).kind.allows_children() {
            return Err(DomError::InvalidParent(parent));
        }
        if parent == child || self.is_descendant(child, parent) {
            return Err(DomError::CycleDetected { parent, child });
        }
        Ok(())
    }

    fn is_descendant(&self, ancestor: NodeId, maybe_descendant: NodeId) -> bool {
        let mut stack: Vec<NodeId> = self.entry(ancestor).children.clone();
        while let Some(current) = stack.pop() {
            if current == maybe_descendant {
                return true;
            }
            stack.extend(self.entry(current).children.iter().copied());
        }
        false
    }

    // ---- attributes, text, style, properties -------------------------------

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.set_attribute_ns(id, None, name, value)
    }

    pub fn set_attribute_ns(
        &mut self,
        id: NodeId,
        ns: Option<&str>,
        name: &str,
        value: &str,
    ) -> Result<(), DomError> {
        let old_value = {
            let NodeKind::Element { attributes, .. } = &mut self.entry_mut(id).kind else {
                return Err(DomError::NotAnElement(id));
            };
            match attributes
                .iter_mut()
                .find(|attr| attr.ns.as_deref() == ns && attr.name.eq_ignore_ascii_case(name))
            {
                Some(attr) => {
                    let old = std::mem::replace(&mut attr.value, value.to_string());
                    Some(old)
                }
                None => {
                    attributes.push(Attribute {
                        ns: ns.map(str::to_string),
                        name: name.to_string(),
                        value: value.to_string(),
                    });
                    None
                }
            }
        };
        self.record(
            id,
            MutationKind::Attributes {
                name: name.to_string(),
                ns: ns.map(str::to_string),
                value: Some(value.to_string()),
                old_value,
            },
        );
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        self.remove_attribute_ns(id, None, name)
    }

    pub fn remove_attribute_ns(
        &mut self,
        id: NodeId,
        ns: Option<&str>,
        name: &str,
    ) -> Result<(), DomError> {
        let old_value = {
            let NodeKind::Element { attributes, .. } = &mut self.entry_mut(id).kind else {
                return Err(DomError::NotAnElement(id));
            };
            match attributes
                .iter()
                .position(|attr| attr.ns.as_deref() == ns && attr.name.eq_ignore_ascii_case(name))
            {
                Some(pos) => Some(attributes.remove(pos).value),
                None => None,
            }
        };
        self.record(
            id,
            MutationKind::Attributes {
                name: name.to_string(),
                ns: ns.map(str::to_string),
                value: None,
                old_value,
            },
        );
        Ok(())
    }

    /// Updates one declaration in the element's style map. The change is
    /// observed as an attribute record for `style` carrying the serialized
    /// declaration text.
    pub fn set_style_property(
        &mut self,
        id: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), DomError> {
        let (old_text, new_text) = {
            let NodeKind::Element { style, .. } = &mut self.entry_mut(id).kind else {
                return Err(DomError::NotAnElement(id));
            };
            let old_text = css_text(style);
            match style.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => style.push((name.to_string(), value.to_string())),
            }
            (old_text, css_text(style))
        };
        self.record(
            id,
            MutationKind::Attributes {
                name: "style".to_string(),
                ns: None,
                value: Some(new_text),
                old_value: if old_text.is_empty() {
                    None
                } else {
                    Some(old_text)
                },
            },
        );
        Ok(())
    }

    pub fn set_text(&mut self, id: NodeId, value: &str) -> Result<(), DomError> {
        let old_value = {
            let NodeKind::Text { data } = &mut self.entry_mut(id).kind else {
                return Err(DomError::NotAText(id));
            };
            std::mem::replace(data, value.to_string())
        };
        self.record(
            id,
            MutationKind::CharacterData {
                value: value.to_string(),
                old_value,
            },
        );
        Ok(())
    }

    /// Observable property assignment. Setting a property to its current
    /// value is a no-op; the first assignment also mirrors the value onto the
    /// same-named attribute when that attribute is absent.
    pub fn set_property(
        &mut self,
        id: NodeId,
        name: &str,
        value: PropValue,
    ) -> Result<(), DomError> {
        let old_value = match self.property(id, name) {
            Some(existing) if *existing == value => return Ok(()),
            Some(existing) => Some(existing.clone()),
            None => {
                if !matches!(self.node_kind(id), NodeKind::Element { .. }) {
                    return Err(DomError::NotAnElement(id));
                }
                None
            }
        };
        if self.attribute(id, name).is_none() {
            self.set_attribute(id, name, &value.to_attr_string())?;
        }
        {
            let NodeKind::Element { properties, .. } = &mut self.entry_mut(id).kind else {
                return Err(DomError::NotAnElement(id));
            };
            match properties.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => *existing = value.clone(),
                None => properties.push((name.to_string(), value.clone())),
            }
        }
        self.record(
            id,
            MutationKind::Properties {
                name: name.to_string(),
                value,
                old_value,
            },
        );
        Ok(())
    }

    // ---- observers ---------------------------------------------------------

    /// Registers an observer for `target`, optionally covering its subtree.
    /// Records accumulate until [`take_records`](Self::take_records) drains
    /// them, so a burst of synchronous mutations is consumed as one batch at
    /// the end of the turn.
    pub fn observe(&mut self, target: NodeId, subtree: bool) -> ObserverId {
        self.observers.push(ObserverState {
            target,
            subtree,
            records: Vec::new(),
            connected: true,
        });
        ObserverId(self.observers.len() - 1)
    }

    pub fn disconnect(&mut self, id: ObserverId) {
        if let Some(observer) = self.observers.get_mut(id.0) {
            observer.connected = false;
            observer.records.clear();
        }
    }

    pub fn take_records(&mut self, id: ObserverId) -> Vec<Mutation> {
        match self.observers.get_mut(id.0) {
            Some(observer) => std::mem::take(&mut observer.records),
            None => Vec::new(),
        }
    }

    pub fn has_pending_records(&self) -> bool {
        self.observers
            .iter()
            .any(|observer| observer.connected && !observer.records.is_empty())
    }

    fn record(&mut self, target: NodeId, kind: MutationKind) {
        let mutation = Mutation { target, kind };
        let mut matched: Vec<usize> = Vec::new();
        for (index, observer) in self.observers.iter().enumerate() {
            if !observer.connected {
                continue;
            }
            let mut hit = observer.target == target;
            if !hit && observer.subtree {
                let mut cursor = self.entry(target).parent;
                while let Some(node) = cursor {
                    if node == observer.target {
                        hit = true;
                        break;
                    }
                    cursor = self.entry(node).parent;
                }
            }
            if hit {
                matched.push(index);
            }
        }
        for index in matched {
            self.observers[index].records.push(mutation.clone());
        }
    }

    // ---- events ------------------------------------------------------------

    pub fn add_event_listener<F>(&mut self, node: NodeId, event_type: &str, handler: F) -> HandlerId
    where
        F: FnMut(&mut TreeDocument, &mut Event) + 'static,
    {
        let id = HandlerId(self.next_handler);
        self.next_handler += 1;
        let handler: EventHandler = Rc::new(std::cell::RefCell::new(handler));
        self.handlers
            .entry(node)
            .or_default()
            .entry(event_type.to_ascii_lowercase())
            .or_default()
            .push((id, handler));
        id
    }

    pub fn remove_event_listener(&mut self, node: NodeId, event_type: &str, handler: HandlerId) {
        if let Some(by_type) = self.handlers.get_mut(&node) {
            if let Some(list) = by_type.get_mut(&event_type.to_ascii_lowercase()) {
                list.retain(|(id, _)| *id != handler);
            }
        }
    }

    /// Dispatches `event` at `target`, bubbling root-ward when the event
    /// bubbles. Handlers run in registration order. Returns `false` when a
    /// handler prevented the default action.
    pub fn dispatch_event(&mut self, target: NodeId, event: &mut Event) -> bool {
        event.target = Some(target);
        let event_type = event.event_type.to_ascii_lowercase();
        let mut current = Some(target);
        'bubble: while let Some(node) = current {
            event.current_target = Some(node);
            let handlers: Vec<EventHandler> = self
                .handlers
                .get(&node)
                .and_then(|by_type| by_type.get(&event_type))
                .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
                .unwrap_or_default();
            for handler in handlers {
                (&mut *handler.borrow_mut())(self, event);
                if event.immediately_stopped() {
                    break 'bubble;
                }
            }
            if event.propagation_stopped() || !event.bubbles {
                break;
            }
            current = self.parent(node);
        }
        !event.default_prevented
    }
}

impl Default for TreeDocument {
    fn default() -> Self {
        Self::new()
    }
}

fn css_text(style: &[(String, String)]) -> String {
    let mut out = String::new();
    for (name, value) in style {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push(';');
    }
    out
}
