use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

mod enhancer;
mod html;
mod selector;

use enhancer::Behavior;
use html::parse_html;
use selector::{SelectorPart, parse_selector_chain};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    DomOp(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    TypeMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::DomOp(msg) => write!(f, "dom operation error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::TypeMismatch {
                selector,
                expected,
                actual,
            } => write!(
                f,
                "type mismatch for {selector}: expected {expected}, actual {actual}"
            ),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: HashMap<String, String>,
    pub(crate) value: String,
    pub(crate) checked: bool,
    pub(crate) disabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    id_index: HashMap<String, NodeId>,
}

impl Dom {
    pub(crate) fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let value = attrs.get("value").cloned().unwrap_or_default();
        let checked = attrs.contains_key("checked");
        let disabled = attrs.contains_key("disabled");
        let element = Element {
            tag_name,
            attrs,
            value,
            checked,
            disabled,
        };
        let id = self.create_node(Some(parent), NodeType::Element(element));
        if let Some(id_attr) = self
            .element(id)
            .and_then(|element| element.attrs.get("id").cloned())
        {
            self.id_index.insert(id_attr, id);
        }
        id
    }

    pub(crate) fn create_detached_element(&mut self, tag_name: &str) -> NodeId {
        let element = Element {
            tag_name: tag_name.to_string(),
            attrs: HashMap::new(),
            value: String::new(),
            checked: false,
            disabled: false,
        };
        self.create_node(None, NodeType::Element(element))
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text))
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes[node_id.0].node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[node_id.0].node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes[node_id.0].parent
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    pub(crate) fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let element = self
            .element_mut(node_id)
            .ok_or_else(|| Error::DomOp("attribute target is not an element".into()))?;
        element.attrs.insert(name.to_string(), value.to_string());
        match name {
            "disabled" => element.disabled = true,
            "value" => element.value = value.to_string(),
            "id" => self.rebuild_id_index(),
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn text_content(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document | NodeType::Element(_) => {
                let mut out = String::new();
                for child in &self.nodes[node_id.0].children {
                    out.push_str(&self.text_content(*child));
                }
                out
            }
            NodeType::Text(text) => text.clone(),
        }
    }

    pub(crate) fn value(&self, node_id: NodeId) -> Result<String> {
        let element = self
            .element(node_id)
            .ok_or_else(|| Error::DomOp("value target is not an element".into()))?;
        Ok(element.value.clone())
    }

    pub(crate) fn set_value(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        let element = self
            .element_mut(node_id)
            .ok_or_else(|| Error::DomOp("value target is not an element".into()))?;
        element.value = value.to_string();
        Ok(())
    }

    pub(crate) fn checked(&self, node_id: NodeId) -> Result<bool> {
        let element = self
            .element(node_id)
            .ok_or_else(|| Error::DomOp("checked target is not an element".into()))?;
        Ok(element.checked)
    }

    pub(crate) fn set_checked(&mut self, node_id: NodeId, checked: bool) -> Result<()> {
        let element = self
            .element_mut(node_id)
            .ok_or_else(|| Error::DomOp("checked target is not an element".into()))?;
        element.checked = checked;
        Ok(())
    }

    pub(crate) fn disabled(&self, node_id: NodeId) -> bool {
        self.element(node_id).map(|e| e.disabled).unwrap_or(false)
    }

    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.element(parent).is_none() {
            return Err(Error::DomOp("append target is not an element".into()));
        }
        if child == self.root || child == parent {
            return Err(Error::DomOp("invalid append node".into()));
        }
        if child.0 >= self.nodes.len() {
            return Err(Error::DomOp("append node is invalid".into()));
        }

        // Prevent cycles: parent must not be inside child's subtree.
        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node == child {
                return Err(Error::DomOp("append would create a cycle".into()));
            }
            cursor = self.parent(node);
        }

        if let Some(old_parent) = self.parent(child) {
            self.nodes[old_parent.0].children.retain(|id| *id != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.rebuild_id_index();
        Ok(())
    }

    // Removal is detachment only: arena slots are never reclaimed, so node
    // ids stay stable for listener bookkeeping.
    pub(crate) fn detach(&mut self, node: NodeId) -> Result<()> {
        if node == self.root {
            return Err(Error::DomOp("cannot detach document root".into()));
        }
        let Some(parent) = self.parent(node) else {
            return Ok(());
        };
        self.nodes[parent.0].children.retain(|id| *id != node);
        self.nodes[node.0].parent = None;
        self.rebuild_id_index();
        Ok(())
    }

    pub(crate) fn rebuild_id_index(&mut self) {
        let mut next = HashMap::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            match &self.nodes[node.0].node_type {
                NodeType::Element(element) => {
                    if let Some(id) = element.attrs.get("id") {
                        if !id.is_empty() {
                            next.insert(id.clone(), node);
                        }
                    }
                }
                NodeType::Document | NodeType::Text(_) => {}
            }
            for child in self.nodes[node.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        self.id_index = next;
    }

    // Explicit stack: this runs on every query, so tree depth must never
    // translate into call depth.
    pub(crate) fn all_element_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if matches!(self.nodes[node.0].node_type, NodeType::Element(_)) {
                out.push(node);
            }
            for child in self.nodes[node.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    pub(crate) fn subtree_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node_id];
        while let Some(node) = stack.pop() {
            out.push(node);
            for child in self.nodes[node.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    pub(crate) fn initialize_form_control_values(&mut self) -> Result<()> {
        let nodes = self.all_element_nodes();
        for node in nodes {
            let is_textarea = self
                .tag_name(node)
                .map(|tag| tag.eq_ignore_ascii_case("textarea"))
                .unwrap_or(false);
            if is_textarea {
                let text = stacker::grow(32 * 1024 * 1024, || self.text_content(node));
                let element = self
                    .element_mut(node)
                    .ok_or_else(|| Error::DomOp("textarea target is not an element".into()))?;
                element.value = text;
            }
        }
        Ok(())
    }

    pub(crate) fn dump_node(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document => {
                let mut out = String::new();
                for child in &self.nodes[node_id.0].children {
                    out.push_str(&self.dump_node(*child));
                }
                out
            }
            NodeType::Text(text) => text.clone(),
            NodeType::Element(element) => {
                let mut out = String::new();
                out.push('<');
                out.push_str(&element.tag_name);
                for (k, v) in &element.attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(v);
                    out.push('"');
                }
                out.push('>');
                for child in &self.nodes[node_id.0].children {
                    out.push_str(&self.dump_node(*child));
                }
                out.push_str("</");
                out.push_str(&element.tag_name);
                out.push('>');
                out
            }
        }
    }
}

pub(crate) fn has_class(element: &Element, class_name: &str) -> bool {
    element
        .attrs
        .get("class")
        .map(|classes| classes.split_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

fn is_checkbox_input(dom: &Dom, node_id: NodeId) -> bool {
    let Some(element) = dom.element(node_id) else {
        return false;
    };
    element.tag_name.eq_ignore_ascii_case("input")
        && element
            .attrs
            .get("type")
            .map(|t| t.eq_ignore_ascii_case("checkbox"))
            .unwrap_or(false)
}

fn is_text_entry(dom: &Dom, node_id: NodeId) -> bool {
    let Some(element) = dom.element(node_id) else {
        return false;
    };
    if element.tag_name.eq_ignore_ascii_case("textarea") {
        return true;
    }
    element.tag_name.eq_ignore_ascii_case("input")
        && element
            .attrs
            .get("type")
            .map(|t| t.eq_ignore_ascii_case("text") || t.eq_ignore_ascii_case("search"))
            .unwrap_or(true)
}

#[derive(Debug, Default, Clone)]
pub(crate) struct ListenerStore {
    map: HashMap<NodeId, HashMap<String, Vec<Behavior>>>,
}

impl ListenerStore {
    pub(crate) fn add(&mut self, node_id: NodeId, event: &str, behavior: Behavior) {
        self.map
            .entry(node_id)
            .or_default()
            .entry(event.to_string())
            .or_default()
            .push(behavior);
    }

    pub(crate) fn get(&self, node_id: NodeId, event: &str) -> Vec<Behavior> {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn drop_node(&mut self, node_id: NodeId) {
        self.map.remove(&node_id);
    }
}

/// Headless page harness. Parses the page markup, installs the enhancement
/// behaviors the page's markup calls for, and replays user gestures against
/// the in-memory DOM.
pub struct Harness {
    pub(crate) dom: Dom,
    pub(crate) listeners: ListenerStore,
}

impl Harness {
    pub fn from_html(html: &str) -> Result<Self> {
        let dom = parse_html(html)?;
        let mut harness = Self {
            dom,
            listeners: ListenerStore::default(),
        };
        enhancer::install(&mut harness);
        Ok(harness)
    }

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) {
            return Ok(());
        }

        self.dispatch_event(target, "click")?;

        if is_checkbox_input(&self.dom, target) {
            let current = self.dom.checked(target)?;
            self.dom.set_checked(target, !current)?;
            self.dispatch_event(target, "input")?;
            self.dispatch_event(target, "change")?;
        }

        Ok(())
    }

    pub fn set_checked(&mut self, selector: &str, checked: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        if !is_checkbox_input(&self.dom, target) {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "checkbox input".to_string(),
                actual: self.dom.tag_name(target).unwrap_or("?").to_string(),
            });
        }
        if self.dom.checked(target)? == checked {
            return Ok(());
        }
        self.dom.set_checked(target, checked)?;
        self.dispatch_event(target, "input")?;
        self.dispatch_event(target, "change")?;
        Ok(())
    }

    pub fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if !is_text_entry(&self.dom, target) {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "text entry control".to_string(),
                actual: self.dom.tag_name(target).unwrap_or("?").to_string(),
            });
        }
        self.dom.set_value(target, text)?;
        self.dispatch_event(target, "input")?;
        Ok(())
    }

    pub fn dispatch(&mut self, selector: &str, event: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dispatch_event(target, event)
    }

    pub fn count(&self, selector: &str) -> Result<usize> {
        Ok(self.select_all(selector)?.len())
    }

    pub fn value(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.value(target)
    }

    pub fn checked(&self, selector: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        self.dom.checked(target)
    }

    pub fn exists(&self, selector: &str) -> Result<bool> {
        Ok(!self.select_all(selector)?.is_empty())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        self.select_one(selector)?;
        Ok(())
    }

    pub fn assert_count(&self, selector: &str, expected: usize) -> Result<()> {
        let actual = self.count(selector)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
                dom_snippet: self.dump_dom("*").unwrap_or_default(),
            });
        }
        Ok(())
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = stacker::grow(32 * 1024 * 1024, || self.dom.text_content(target));
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_value(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.value(target)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_checked(&self, selector: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.checked(target)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
                dom_snippet: self.snippet(target),
            });
        }
        Ok(())
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(stacker::grow(32 * 1024 * 1024, || {
            self.dom.dump_node(target)
        }))
    }

    fn snippet(&self, target: NodeId) -> String {
        stacker::grow(32 * 1024 * 1024, || self.dom.dump_node(target))
    }

    pub(crate) fn select_one(&self, selector: &str) -> Result<NodeId> {
        let chain = parse_selector_chain(selector)?;
        if let Some(id) = id_only_chain(&chain) {
            return self
                .dom
                .by_id(id)
                .ok_or_else(|| Error::SelectorNotFound(selector.to_string()));
        }
        self.dom
            .all_element_nodes()
            .into_iter()
            .find(|node| self.dom.matches_selector_chain(*node, &chain))
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    pub(crate) fn select_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let chain = parse_selector_chain(selector)?;
        if let Some(id) = id_only_chain(&chain) {
            return Ok(self.dom.by_id(id).into_iter().collect());
        }
        Ok(self
            .dom
            .all_element_nodes()
            .into_iter()
            .filter(|node| self.dom.matches_selector_chain(*node, &chain))
            .collect())
    }

    fn dispatch_event(&mut self, target: NodeId, event_type: &str) -> Result<()> {
        // Target first, then ancestors in bubble order. Behaviors run to
        // completion before the next one starts.
        let mut pending = Vec::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            pending.extend(self.listeners.get(node, event_type));
            cursor = self.dom.parent(node);
        }
        for behavior in pending {
            enhancer::run(self, behavior)?;
        }
        Ok(())
    }
}

fn id_only_chain<'a>(chain: &'a [SelectorPart]) -> Option<&'a str> {
    match chain {
        [part] => part.step.id_only(),
        _ => None,
    }
}

#[cfg(test)]
mod tests;
