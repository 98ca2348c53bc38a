//! Arena-backed [`Stage`] implementation.
//!
//! Serves as the default host tree for embedders without their own display
//! arena, and as the test double everything in this crate is exercised
//! against. Detached subtrees stay allocated so late records can still
//! resolve their targets.

use std::collections::HashMap;

use core_types::Rect;
use proto::{AttrEntry, NodeType, PropValue};

use crate::stage::{Stage, StageError, StageKey};

#[derive(Debug)]
enum PageNode {
    Element {
        name: String,
        attributes: Vec<AttrEntry>,
        style: Vec<(String, String)>,
        properties: Vec<(String, PropValue)>,
    },
    Text {
        data: String,
    },
}

#[derive(Debug)]
struct NodeRecord {
    node: PageNode,
    parent: Option<StageKey>,
    children: Vec<StageKey>,
}

pub struct ArenaPage {
    nodes: Vec<NodeRecord>,
    mount: StageKey,
    boxes: HashMap<StageKey, Rect>,
}

impl ArenaPage {
    pub fn new() -> Self {
        let mut page = Self {
            nodes: Vec::new(),
            mount: StageKey(0),
            boxes: HashMap::new(),
        };
        page.mount = page.alloc(PageNode::Element {
            name: "MAIN".to_string(),
            attributes: Vec::new(),
            style: Vec::new(),
            properties: Vec::new(),
        });
        page
    }

    fn alloc(&mut self, node: PageNode) -> StageKey {
        let key = StageKey(self.nodes.len() as u32);
        self.nodes.push(NodeRecord {
            node,
            parent: None,
            children: Vec::new(),
        });
        key
    }

    fn entry(&self, key: StageKey) -> Result<&NodeRecord, StageError> {
        self.nodes
            .get(key.0 as usize)
            .ok_or(StageError::UnknownKey(key))
    }

    fn entry_mut(&mut self, key: StageKey) -> Result<&mut NodeRecord, StageError> {
        self.nodes
            .get_mut(key.0 as usize)
            .ok_or(StageError::UnknownKey(key))
    }

    fn is_descendant(&self, ancestor: StageKey, maybe_descendant: StageKey) -> bool {
        let Ok(entry) = self.entry(ancestor) else {
            return false;
        };
        let mut stack = entry.children.clone();
        while let Some(current) = stack.pop() {
            if current == maybe_descendant {
                return true;
            }
            if let Ok(entry) = self.entry(current) {
                stack.extend(entry.children.iter().copied());
            }
        }
        false
    }

    fn detach(&mut self, child: StageKey) -> Result<(), StageError> {
        if let Some(parent) = self.entry(child)?.parent {
            self.remove_child(parent, child)?;
        }
        Ok(())
    }

    /// Test/layout hook: assigns the box the viewport policy consults.
    pub fn set_bounding_box(&mut self, key: StageKey, rect: Rect) {
        self.boxes.insert(key, rect);
    }

    // Readback conveniences beyond the Stage trait.

    pub fn attribute(&self, key: StageKey, name: &str) -> Option<&str> {
        match &self.entry(key).ok()?.node {
            PageNode::Element { attributes, .. } => attributes
                .iter()
                .find(|attr| attr.ns.is_none() && attr.name.eq_ignore_ascii_case(name))
                .map(|attr| attr.value.as_str()),
            PageNode::Text { .. } => None,
        }
    }

    pub fn property(&self, key: StageKey, name: &str) -> Option<&PropValue> {
        match &self.entry(key).ok()?.node {
            PageNode::Element { properties, .. } => properties
                .iter()
                .find(|(prop, _)| prop == name)
                .map(|(_, value)| value),
            PageNode::Text { .. } => None,
        }
    }

    pub fn style_value(&self, key: StageKey, name: &str) -> Option<&str> {
        match &self.entry(key).ok()?.node {
            PageNode::Element { style, .. } => style
                .iter()
                .find(|(prop, _)| prop == name)
                .map(|(_, value)| value.as_str()),
            PageNode::Text { .. } => None,
        }
    }

    pub fn text(&self, key: StageKey) -> Option<&str> {
        match &self.entry(key).ok()?.node {
            PageNode::Text { data } => Some(data),
            PageNode::Element { .. } => None,
        }
    }

    pub fn text_content(&self, key: StageKey) -> String {
        fn walk(page: &ArenaPage, key: StageKey, out: &mut String) {
            let Ok(entry) = page.entry(key) else {
                return;
            };
            match &entry.node {
                PageNode::Text { data } => out.push_str(data),
                PageNode::Element { .. } => {
                    for child in &entry.children {
                        walk(page, *child, out);
                    }
                }
            }
        }
        let mut out = String::new();
        walk(self, key, &mut out);
        out
    }
}

impl Default for ArenaPage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for ArenaPage {
    fn mount(&self) -> StageKey {
        self.mount
    }

    fn create_element(&mut self, name: &str) -> StageKey {
        self.alloc(PageNode::Element {
            name: name.to_ascii_uppercase(),
            attributes: Vec::new(),
            style: Vec::new(),
            properties: Vec::new(),
        })
    }

    fn create_text(&mut self, data: &str) -> StageKey {
        self.alloc(PageNode::Text {
            data: data.to_string(),
        })
    }

    fn insert_before(
        &mut self,
        parent: StageKey,
        child: StageKey,
        reference: Option<StageKey>,
    ) -> Result<(), StageError> {
        if !matches!(self.entry(parent)?.node, PageNode::Element { .. }) {
            return Err(StageError::InvalidParent(parent));
        }
        if parent == child || self.is_descendant(child, parent) {
            return Err(StageError::CycleDetected { parent, child });
        }
        if let Some(reference) = reference {
            if self.entry(reference)?.parent != Some(parent) {
                return Err(StageError::MissingReference { parent, reference });
            }
        }
        self.detach(child)?;
        let position = match reference {
            Some(reference) => self
                .entry(parent)?
                .children
                .iter()
                .position(|key| *key == reference)
                .ok_or(StageError::MissingReference { parent, reference })?,
            None => self.entry(parent)?.children.len(),
        };
        self.entry_mut(parent)?.children.insert(position, child);
        self.entry_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn remove_child(&mut self, parent: StageKey, child: StageKey) -> Result<(), StageError> {
        if self.entry(child)?.parent != Some(parent) {
            return Err(StageError::NotAChild { parent, child });
        }
        self.entry_mut(parent)?.children.retain(|key| *key != child);
        self.entry_mut(child)?.parent = None;
        Ok(())
    }

    fn set_attribute(
        &mut self,
        key: StageKey,
        ns: Option<&str>,
        name: &str,
        value: &str,
    ) -> Result<(), StageError> {
        match &mut self.entry_mut(key)?.node {
            PageNode::Element { attributes, .. } => {
                match attributes
                    .iter_mut()
                    .find(|attr| attr.ns.as_deref() == ns && attr.name.eq_ignore_ascii_case(name))
                {
                    Some(attr) => attr.value = value.to_string(),
                    None => attributes.push(AttrEntry {
                        ns: ns.map(str::to_string),
                        name: name.to_string(),
                        value: value.to_string(),
                    }),
                }
                Ok(())
            }
            PageNode::Text { .. } => Err(StageError::WrongKind(key)),
        }
    }

    fn remove_attribute(
        &mut self,
        key: StageKey,
        ns: Option<&str>,
        name: &str,
    ) -> Result<(), StageError> {
        match &mut self.entry_mut(key)?.node {
            PageNode::Element { attributes, .. } => {
                attributes
                    .retain(|attr| !(attr.ns.as_deref() == ns && attr.name.eq_ignore_ascii_case(name)));
                Ok(())
            }
            PageNode::Text { .. } => Err(StageError::WrongKind(key)),
        }
    }

    fn set_text(&mut self, key: StageKey, value: &str) -> Result<(), StageError> {
        match &mut self.entry_mut(key)?.node {
            PageNode::Text { data } => {
                *data = value.to_string();
                Ok(())
            }
            PageNode::Element { .. } => Err(StageError::WrongKind(key)),
        }
    }

    fn set_style(&mut self, key: StageKey, name: &str, value: &str) -> Result<(), StageError> {
        match &mut self.entry_mut(key)?.node {
            PageNode::Element { style, .. } => {
                match style.iter_mut().find(|(prop, _)| prop == name) {
                    Some((_, existing)) => *existing = value.to_string(),
                    None => style.push((name.to_string(), value.to_string())),
                }
                Ok(())
            }
            PageNode::Text { .. } => Err(StageError::WrongKind(key)),
        }
    }

    fn set_property(
        &mut self,
        key: StageKey,
        name: &str,
        value: &PropValue,
    ) -> Result<(), StageError> {
        match &mut self.entry_mut(key)?.node {
            PageNode::Element { properties, .. } => {
                match properties.iter_mut().find(|(prop, _)| prop == name) {
                    Some((_, existing)) => *existing = value.clone(),
                    None => properties.push((name.to_string(), value.clone())),
                }
                Ok(())
            }
            PageNode::Text { .. } => Err(StageError::WrongKind(key)),
        }
    }

    fn node_type(&self, key: StageKey) -> Option<NodeType> {
        match self.entry(key).ok()?.node {
            PageNode::Element { .. } => Some(NodeType::Element),
            PageNode::Text { .. } => Some(NodeType::Text),
        }
    }

    fn node_name(&self, key: StageKey) -> Option<String> {
        match &self.entry(key).ok()?.node {
            PageNode::Element { name, .. } => Some(name.clone()),
            PageNode::Text { .. } => Some("#text".to_string()),
        }
    }

    fn parent(&self, key: StageKey) -> Option<StageKey> {
        self.entry(key).ok()?.parent
    }

    fn child_nodes(&self, key: StageKey) -> Vec<StageKey> {
        self.entry(key)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    fn bounding_box(&self, key: StageKey) -> Option<Rect> {
        self.boxes.get(&key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_maintain_links() {
        let mut page = ArenaPage::new();
        let mount = page.mount();
        let div = page.create_element("div");
        let span = page.create_element("span");
        page.insert_before(mount, div, None).unwrap();
        page.insert_before(mount, span, Some(div)).unwrap();
        assert_eq!(page.child_nodes(mount), vec![span, div]);

        page.remove_child(mount, span).unwrap();
        assert_eq!(page.child_nodes(mount), vec![div]);
        assert_eq!(page.parent(span), None);
        // Detached nodes stay readable.
        assert_eq!(page.node_name(span).as_deref(), Some("SPAN"));
    }

    #[test]
    fn insert_detaches_from_previous_parent() {
        let mut page = ArenaPage::new();
        let mount = page.mount();
        let a = page.create_element("div");
        let b = page.create_element("div");
        let child = page.create_text("x");
        page.insert_before(mount, a, None).unwrap();
        page.insert_before(mount, b, None).unwrap();
        page.insert_before(a, child, None).unwrap();

        page.insert_before(b, child, None).unwrap();
        assert!(page.child_nodes(a).is_empty());
        assert_eq!(page.child_nodes(b), vec![child]);
    }

    #[test]
    fn guards_fail_loudly() {
        let mut page = ArenaPage::new();
        let mount = page.mount();
        let div = page.create_element("div");
        let text = page.create_text("t");

        assert_eq!(
            page.remove_child(mount, div),
            Err(StageError::NotAChild {
                parent: mount,
                child: div
            })
        );
        assert_eq!(
            page.insert_before(text, div, None),
            Err(StageError::InvalidParent(text))
        );
        assert_eq!(
            page.set_text(div, "x"),
            Err(StageError::WrongKind(div))
        );
        assert_eq!(
            page.set_attribute(text, None, "a", "b"),
            Err(StageError::WrongKind(text))
        );
        assert!(matches!(
            page.insert_before(mount, StageKey(999), None),
            Err(StageError::UnknownKey(_))
        ));
    }

    #[test]
    fn attributes_match_case_insensitively() {
        let mut page = ArenaPage::new();
        let div = page.create_element("div");
        page.set_attribute(div, None, "Class", "a").unwrap();
        page.set_attribute(div, None, "class", "b").unwrap();
        assert_eq!(page.attribute(div, "CLASS"), Some("b"));
        page.remove_attribute(div, None, "class").unwrap();
        assert_eq!(page.attribute(div, "class"), None);
    }
}
