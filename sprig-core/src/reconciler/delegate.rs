//! Event delegation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::dom::{Event, EventHandler, ListenerId, Node};

/// Bubbling events routed through the mount container in delegated mode.
pub const DELEGATED_EVENTS: &[&str] = &[
    "click",
    "dblclick",
    "input",
    "change",
    "keydown",
    "keyup",
    "submit",
    "mousedown",
    "mouseup",
    "pointerdown",
    "pointerup",
    "focusin",
    "focusout",
];

pub fn is_delegated(event: &str) -> bool {
    DELEGATED_EVENTS.contains(&event)
}

/// One listener per event type on the container, dispatching to handlers
/// registered for descendant nodes.
pub struct Delegator {
    container: Node,
    handlers: RefCell<HashMap<u64, IndexMap<Rc<str>, EventHandler>>>,
    roots: RefCell<IndexMap<Rc<str>, ListenerId>>,
    me: Weak<Delegator>,
}

impl Delegator {
    pub fn new(container: &Node) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            container: container.clone(),
            handlers: RefCell::new(HashMap::new()),
            roots: RefCell::new(IndexMap::new()),
            me: me.clone(),
        })
    }

    pub fn container(&self) -> &Node {
        &self.container
    }

    /// Handlers currently registered for descendant nodes.
    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().values().map(IndexMap::len).sum()
    }

    pub(crate) fn register(&self, node: &Node, event: &str, handler: EventHandler) {
        self.ensure_root(event);
        self.handlers
            .borrow_mut()
            .entry(node.id())
            .or_default()
            .insert(Rc::from(event), handler);
    }

    pub(crate) fn unregister(&self, node: &Node, event: &str) {
        let mut handlers = self.handlers.borrow_mut();
        if let Some(events) = handlers.get_mut(&node.id()) {
            events.shift_remove(event);
            if events.is_empty() {
                handlers.remove(&node.id());
            }
        }
    }

    /// Remove the container listeners.
    pub(crate) fn dispose(&self) {
        for (event, id) in self.roots.borrow_mut().drain(..) {
            self.container.remove_event_listener(&event, id);
        }
        self.handlers.borrow_mut().clear();
    }

    fn ensure_root(&self, event: &str) {
        if self.roots.borrow().contains_key(event) {
            return;
        }
        let id = ListenerId::new();
        let me = self.me.clone();
        self.container.add_event_listener(
            event,
            id,
            Rc::new(move |event: &Event| {
                if let Some(delegator) = me.upgrade() {
                    delegator.dispatch(event);
                }
            }),
        );
        self.roots.borrow_mut().insert(Rc::from(event), id);
        tracing::trace!(event, "delegated listener installed");
    }

    /// Walk from the target up to the container, calling the handler
    /// registered on each node until one stops propagation.
    fn dispatch(&self, event: &Event) {
        let mut current = event.target();
        while let Some(node) = current {
            if node == self.container {
                break;
            }
            let handler = self
                .handlers
                .borrow()
                .get(&node.id())
                .and_then(|events| events.get(event.name()).cloned());
            if let Some(handler) = handler {
                event.set_current_target(Some(&node));
                handler(event);
                if event.propagation_stopped() {
                    break;
                }
            }
            current = node.parent();
        }
        event.set_current_target(Some(&self.container));
    }
}

impl fmt::Debug for Delegator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegator")
            .field("container", &self.container.id())
            .field("events", &self.roots.borrow().keys().collect::<Vec<_>>())
            .field("handlers", &self.handler_count())
            .finish()
    }
}
