//! DOM nodes.
//!
//! A [`Node`] is a cheap, reference-counted handle. Children are owned by
//! their parent; the parent link is weak so detached subtrees are freed as
//! soon as the last handle goes away.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::event::{Event, EventHandler, ListenerId};
use super::DomError;

/// Counter for generating unique node ids.
static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// What kind of node this is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(String),
    Text,
    Comment,
    Fragment,
}

struct Listener {
    event: String,
    id: ListenerId,
    handler: EventHandler,
}

pub(crate) struct NodeData {
    id: u64,
    kind: NodeKind,
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<Node>>,
    attributes: RefCell<IndexMap<String, String>>,
    data: RefCell<String>,
    raw_html: RefCell<Option<String>>,
    listeners: RefCell<Vec<Listener>>,
    mutations: Cell<u64>,
}

/// A handle to a node in the host document.
#[derive(Clone)]
pub struct Node(Rc<NodeData>);

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl Node {
    pub(crate) fn new(kind: NodeKind, data: impl Into<String>) -> Self {
        Self(Rc::new(NodeData {
            id: NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            kind,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            attributes: RefCell::new(IndexMap::new()),
            data: RefCell::new(data.into()),
            raw_html: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
            mutations: Cell::new(0),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    /// Lower-case tag name for elements.
    pub fn tag_name(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        self.0.kind == NodeKind::Text
    }

    fn can_have_children(&self) -> bool {
        matches!(
            self.0.kind,
            NodeKind::Document | NodeKind::Element(_) | NodeKind::Fragment
        )
    }

    fn touch(&self) {
        self.0.mutations.set(self.0.mutations.get() + 1);
    }

    /// Number of mutations applied directly to this node.
    pub fn mutation_count(&self) -> u64 {
        self.0.mutations.get()
    }

    // =========================================================================
    // TREE
    // =========================================================================

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.children.borrow().first().cloned()
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let siblings = parent.0.children.borrow();
        let index = siblings.iter().position(|child| child == self)?;
        siblings.get(index + 1).cloned()
    }

    /// Whether `other` is this node or one of its descendants.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if &node == self {
                return true;
            }
            current = node.parent();
        }
        false
    }

    pub fn append_child(&self, child: &Node) -> Result<(), DomError> {
        self.insert_before(child, None)
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None`. A child that already has a parent is moved. Inserting a
    /// fragment moves the fragment's children instead.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> Result<(), DomError> {
        if !self.can_have_children() {
            return Err(DomError::HierarchyRequest(format!(
                "{} cannot have children",
                self.describe()
            )));
        }
        if child.contains(self) {
            return Err(DomError::HierarchyRequest(format!(
                "{} is an ancestor of {}",
                child.describe(),
                self.describe()
            )));
        }
        if let Some(reference) = reference {
            if reference.parent().as_ref() != Some(self) {
                return Err(DomError::NotAChild(reference.describe()));
            }
            if reference == child {
                return Ok(());
            }
        }

        if child.0.kind == NodeKind::Fragment {
            for grandchild in child.children() {
                self.insert_before(&grandchild, reference)?;
            }
            return Ok(());
        }

        if let Some(old_parent) = child.parent() {
            old_parent.detach(child);
        }

        {
            let mut children = self.0.children.borrow_mut();
            let index = match reference {
                Some(reference) => children
                    .iter()
                    .position(|c| c == reference)
                    .ok_or_else(|| DomError::NotAChild(reference.describe()))?,
                None => children.len(),
            };
            children.insert(index, child.clone());
        }
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.touch();
        Ok(())
    }

    pub fn remove_child(&self, child: &Node) -> Result<(), DomError> {
        if child.parent().as_ref() != Some(self) {
            return Err(DomError::NotAChild(child.describe()));
        }
        self.detach(child);
        self.touch();
        Ok(())
    }

    /// Remove this node from its parent, if it has one.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent.detach(self);
            parent.touch();
        }
    }

    fn detach(&self, child: &Node) {
        self.0.children.borrow_mut().retain(|c| c != child);
        *child.0.parent.borrow_mut() = Weak::new();
    }

    // =========================================================================
    // CONTENT
    // =========================================================================

    /// Character data of a text or comment node.
    pub fn data(&self) -> String {
        self.0.data.borrow().clone()
    }

    pub fn set_data(&self, data: &str) -> Result<(), DomError> {
        match self.0.kind {
            NodeKind::Text | NodeKind::Comment => {
                *self.0.data.borrow_mut() = data.to_string();
                self.touch();
                Ok(())
            }
            _ => Err(DomError::InvalidNodeType(self.describe())),
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        match self.0.kind {
            NodeKind::Text => self.data(),
            NodeKind::Comment => String::new(),
            _ => {
                let mut text = String::new();
                for child in self.0.children.borrow().iter() {
                    text.push_str(&child.text_content());
                }
                text
            }
        }
    }

    /// Replace the content with a single text node (or set the data of a
    /// text node).
    pub fn set_text_content(&self, text: &str) -> Result<(), DomError> {
        match self.0.kind {
            NodeKind::Text | NodeKind::Comment => self.set_data(text),
            _ => {
                for child in self.children() {
                    self.detach(&child);
                }
                *self.0.raw_html.borrow_mut() = None;
                if !text.is_empty() {
                    self.append_child(&Node::new(NodeKind::Text, text))?;
                }
                self.touch();
                Ok(())
            }
        }
    }

    /// Replace the content with unparsed markup.
    pub fn set_inner_html(&self, html: &str) -> Result<(), DomError> {
        if !self.is_element() {
            return Err(DomError::InvalidNodeType(self.describe()));
        }
        for child in self.children() {
            self.detach(&child);
        }
        *self.0.raw_html.borrow_mut() = Some(html.to_string());
        self.touch();
        Ok(())
    }

    // =========================================================================
    // ATTRIBUTES
    // =========================================================================

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<(), DomError> {
        if !self.is_element() {
            return Err(DomError::InvalidNodeType(self.describe()));
        }
        self.0
            .attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        self.touch();
        Ok(())
    }

    pub fn remove_attribute(&self, name: &str) {
        if self.0.attributes.borrow_mut().shift_remove(name).is_some() {
            self.touch();
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.0.attributes.borrow().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.0.attributes.borrow().contains_key(name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.0.attributes.borrow().keys().cloned().collect()
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Register a listener. The same `id` for the same event is only
    /// registered once.
    pub fn add_event_listener(&self, event: &str, id: ListenerId, handler: EventHandler) {
        let mut listeners = self.0.listeners.borrow_mut();
        if listeners.iter().any(|l| l.event == event && l.id == id) {
            return;
        }
        listeners.push(Listener {
            event: event.to_string(),
            id,
            handler,
        });
    }

    pub fn remove_event_listener(&self, event: &str, id: ListenerId) {
        self.0
            .listeners
            .borrow_mut()
            .retain(|l| !(l.event == event && l.id == id));
    }

    /// Listeners attached directly to this node.
    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    /// Listeners attached to this node and all of its descendants.
    pub fn total_listener_count(&self) -> usize {
        self.listener_count()
            + self
                .0
                .children
                .borrow()
                .iter()
                .map(Node::total_listener_count)
                .sum::<usize>()
    }

    /// Dispatch an event at this node. Bubbling events visit every ancestor
    /// until a handler stops propagation.
    pub fn dispatch_event(&self, event: &Event) {
        event.set_target(self);
        let mut current = Some(self.clone());
        while let Some(node) = current {
            event.set_current_target(Some(&node));
            node.invoke_listeners(event);
            if event.propagation_stopped() || !event.bubbles() {
                break;
            }
            current = node.parent();
        }
        event.set_current_target(None);
    }

    pub(crate) fn invoke_listeners(&self, event: &Event) {
        let handlers: Vec<EventHandler> = self
            .0
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event == event.name())
            .map(|l| Rc::clone(&l.handler))
            .collect();
        for handler in handlers {
            handler(event);
            if event.immediate_propagation_stopped() {
                break;
            }
        }
    }

    // =========================================================================
    // QUERIES & SERIALIZATION
    // =========================================================================

    /// First descendant (depth first) matching `#id`, `.class` or a tag name.
    pub fn query_selector(&self, selector: &str) -> Option<Node> {
        for child in self.0.children.borrow().iter() {
            if child.matches(selector) {
                return Some(child.clone());
            }
            if let Some(found) = child.query_selector(selector) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants matching the selector, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Vec<Node> {
        let mut found = Vec::new();
        for child in self.0.children.borrow().iter() {
            if child.matches(selector) {
                found.push(child.clone());
            }
            found.extend(child.query_selector_all(selector));
        }
        found
    }

    fn matches(&self, selector: &str) -> bool {
        let Some(tag) = self.tag_name() else {
            return false;
        };
        if let Some(id) = selector.strip_prefix('#') {
            self.get_attribute("id").as_deref() == Some(id)
        } else if let Some(class) = selector.strip_prefix('.') {
            self.get_attribute("class")
                .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
        } else {
            tag.eq_ignore_ascii_case(selector)
        }
    }

    pub fn inner_html(&self) -> String {
        if let Some(raw) = self.0.raw_html.borrow().as_ref() {
            return raw.clone();
        }
        let mut html = String::new();
        for child in self.0.children.borrow().iter() {
            child.write_html(&mut html);
        }
        html
    }

    pub fn outer_html(&self) -> String {
        let mut html = String::new();
        self.write_html(&mut html);
        html
    }

    fn write_html(&self, out: &mut String) {
        match &self.0.kind {
            NodeKind::Text => out.push_str(&escape(&self.data(), false)),
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&self.data());
                out.push_str("-->");
            }
            NodeKind::Document | NodeKind::Fragment => out.push_str(&self.inner_html()),
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in self.0.attributes.borrow().iter() {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape(value, true));
                        out.push('"');
                    }
                }
                out.push('>');
                out.push_str(&self.inner_html());
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn describe(&self) -> String {
        match &self.0.kind {
            NodeKind::Element(tag) => format!("<{}>#{}", tag, self.0.id),
            other => format!("{:?}#{}", other, self.0.id),
        }
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: &str) -> Node {
        Node::new(NodeKind::Element(tag.into()), "")
    }

    fn text(data: &str) -> Node {
        Node::new(NodeKind::Text, data)
    }

    #[test]
    fn insert_and_reorder_children() {
        let list = element("ul");
        let a = element("li");
        let b = element("li");
        a.append_child(&text("a")).unwrap();
        b.append_child(&text("b")).unwrap();

        list.append_child(&a).unwrap();
        list.append_child(&b).unwrap();
        assert_eq!(list.text_content(), "ab");

        list.insert_before(&b, Some(&a)).unwrap();
        assert_eq!(list.text_content(), "ba");
        assert_eq!(list.child_count(), 2);
        assert_eq!(a.parent(), Some(list.clone()));
    }

    #[test]
    fn hierarchy_errors() {
        let outer = element("div");
        let inner = element("span");
        outer.append_child(&inner).unwrap();

        assert!(matches!(
            inner.append_child(&outer),
            Err(DomError::HierarchyRequest(_))
        ));
        assert!(matches!(
            text("x").append_child(&element("b")),
            Err(DomError::HierarchyRequest(_))
        ));
        assert!(matches!(
            element("p").remove_child(&inner),
            Err(DomError::NotAChild(_))
        ));
    }

    #[test]
    fn fragment_insertion_moves_children() {
        let host = element("div");
        let fragment = Node::new(NodeKind::Fragment, "");
        fragment.append_child(&text("1")).unwrap();
        fragment.append_child(&text("2")).unwrap();

        host.append_child(&fragment).unwrap();
        assert_eq!(host.child_count(), 2);
        assert_eq!(fragment.child_count(), 0);
    }

    #[test]
    fn serializes_markup() {
        let div = element("div");
        div.set_attribute("class", "card").unwrap();
        div.set_attribute("hidden", "").unwrap();
        div.append_child(&text("a < b")).unwrap();
        div.append_child(&Node::new(NodeKind::Comment, "marker")).unwrap();

        assert_eq!(
            div.outer_html(),
            "<div class=\"card\" hidden>a &lt; b<!--marker--></div>"
        );
    }

    #[test]
    fn selectors() {
        let root = element("main");
        let item = element("li");
        item.set_attribute("id", "first").unwrap();
        item.set_attribute("class", "item active").unwrap();
        root.append_child(&item).unwrap();

        assert_eq!(root.query_selector("#first"), Some(item.clone()));
        assert_eq!(root.query_selector(".active"), Some(item.clone()));
        assert_eq!(root.query_selector("LI"), Some(item));
        assert!(root.query_selector("#missing").is_none());
    }
}
