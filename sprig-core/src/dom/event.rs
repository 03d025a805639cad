//! DOM events and listener identity.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::node::Node;

/// Counter for generating unique listener ids.
static LISTENER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity token for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn new() -> Self {
        Self(LISTENER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// A callback invoked for a dispatched event.
pub type EventHandler = Rc<dyn Fn(&Event)>;

/// A dispatched event.
pub struct Event {
    name: String,
    bubbles: bool,
    detail: Option<String>,
    target: RefCell<Option<Node>>,
    current_target: RefCell<Option<Node>>,
    propagation_stopped: Cell<bool>,
    immediate_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl Event {
    /// A bubbling event.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), true, None)
    }

    /// An event that only reaches its target.
    pub fn non_bubbling(name: impl Into<String>) -> Self {
        Self::build(name.into(), false, None)
    }

    /// A bubbling event carrying a string payload (for example the new
    /// value of an input).
    pub fn with_detail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::build(name.into(), true, Some(detail.into()))
    }

    fn build(name: String, bubbles: bool, detail: Option<String>) -> Self {
        Self {
            name,
            bubbles,
            detail,
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            propagation_stopped: Cell::new(false),
            immediate_stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// The node the event was dispatched at.
    pub fn target(&self) -> Option<Node> {
        self.target.borrow().clone()
    }

    /// The node whose listener is currently running.
    pub fn current_target(&self) -> Option<Node> {
        self.current_target.borrow().clone()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn stop_immediate_propagation(&self) {
        self.propagation_stopped.set(true);
        self.immediate_stopped.set(true);
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub(crate) fn immediate_propagation_stopped(&self) -> bool {
        self.immediate_stopped.get()
    }

    pub(crate) fn set_target(&self, node: &Node) {
        *self.target.borrow_mut() = Some(node.clone());
    }

    pub(crate) fn set_current_target(&self, node: Option<&Node>) {
        *self.current_target.borrow_mut() = node.cloned();
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("bubbles", &self.bubbles)
            .field("target", &self.target.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeKind;

    #[test]
    fn bubbling_reaches_ancestors_until_stopped() {
        let outer = Node::new(NodeKind::Element("div".into()), "");
        let inner = Node::new(NodeKind::Element("button".into()), "");
        outer.append_child(&inner).unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        outer.add_event_listener(
            "click",
            ListenerId::new(),
            Rc::new(move |e: &Event| {
                l.borrow_mut()
                    .push(("outer", e.current_target().and_then(|n| n.tag_name().map(String::from))));
            }),
        );
        let l = log.clone();
        let stop = ListenerId::new();
        inner.add_event_listener(
            "click",
            stop,
            Rc::new(move |e: &Event| {
                l.borrow_mut().push(("inner", e.target().and_then(|n| n.tag_name().map(String::from))));
            }),
        );

        inner.dispatch_event(&Event::new("click"));
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(log.borrow()[1], ("outer", Some("div".to_string())));

        inner.remove_event_listener("click", stop);
        inner.add_event_listener("click", ListenerId::new(), Rc::new(|e: &Event| e.stop_propagation()));
        log.borrow_mut().clear();
        inner.dispatch_event(&Event::new("click"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn non_bubbling_events_stay_on_target() {
        let outer = Node::new(NodeKind::Element("form".into()), "");
        let inner = Node::new(NodeKind::Element("input".into()), "");
        outer.append_child(&inner).unwrap();

        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        outer.add_event_listener("focus", ListenerId::new(), Rc::new(move |_: &Event| h.set(h.get() + 1)));

        inner.dispatch_event(&Event::non_bubbling("focus"));
        assert_eq!(hits.get(), 0);
    }
}
