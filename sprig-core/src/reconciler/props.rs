//! Element props: attributes, listeners and binding effects.

use std::rc::Rc;

use indexmap::IndexMap;

use super::delegate::{is_delegated, Delegator};
use super::Cx;
use crate::dom::{DomError, EventHandler, ListenerId, Node};
use crate::error::Result;
use crate::reactive::Effect;
use crate::vnode::{style_to_css, PropMap, PropValue, SignalSource, Value};

struct Listener {
    id: ListenerId,
    delegator: Option<Rc<Delegator>>,
}

/// Prop state applied to one mounted element.
#[derive(Default)]
pub struct ElementProps {
    applied: PropMap,
    listeners: IndexMap<Rc<str>, Listener>,
    bindings: IndexMap<Rc<str>, Effect>,
}

fn is_reserved(name: &str) -> bool {
    matches!(name, "key" | "ref" | "children")
}

impl ElementProps {
    /// Bring `node` in line with `next`, touching only props that changed.
    pub(crate) fn apply(&mut self, node: &Node, next: &PropMap, cx: &Cx) -> Result<()> {
        let removed: Vec<Rc<str>> = self
            .applied
            .keys()
            .filter(|name| !next.contains_key(*name))
            .cloned()
            .collect();
        for name in removed {
            self.detach(node, &name);
            if let Some(previous) = self.applied.shift_remove(&name) {
                clear_attribute(node, &name, &previous)?;
            }
        }

        for (name, value) in next {
            if is_reserved(name) {
                continue;
            }
            let previous = self.applied.get(name);
            if previous.is_some_and(|previous| previous.same(value)) {
                continue;
            }
            if let (Some(PropValue::Handler(_)), PropValue::Handler(handler)) = (previous, value) {
                self.swap_handler(node, name, handler);
                self.applied.insert(Rc::clone(name), value.clone());
                continue;
            }
            self.detach(node, name);
            if let Some(previous) = self.applied.shift_remove(name) {
                if matches!(value, PropValue::Handler(_)) {
                    clear_attribute(node, name, &previous)?;
                }
            }
            self.set(node, name, value, cx)?;
            self.applied.insert(Rc::clone(name), value.clone());
        }
        Ok(())
    }

    /// Remove listeners and dispose binding effects. Attributes stay.
    pub(crate) fn dispose(&mut self, node: &Node) {
        for (event, listener) in self.listeners.drain(..) {
            remove_listener(node, &event, &listener);
        }
        for (_, binding) in self.bindings.drain(..) {
            binding.dispose();
        }
        self.applied.clear();
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn set(&mut self, node: &Node, name: &Rc<str>, value: &PropValue, cx: &Cx) -> Result<()> {
        match value {
            PropValue::Value(value) => write_value(node, name, value)?,
            PropValue::Style(style) => node.set_attribute("style", &style_to_css(style))?,
            PropValue::Handler(handler) => self.listen(node, name, handler, cx),
            PropValue::Signal(source) => {
                let binding = bind(node, name, Rc::clone(source))?;
                self.bindings.insert(Rc::clone(name), binding);
            }
            PropValue::Data(_) | PropValue::Container(_) => {
                tracing::warn!(prop = %name, "ignoring non-DOM prop on element");
            }
        }
        Ok(())
    }

    fn listen(&mut self, node: &Node, name: &Rc<str>, handler: &EventHandler, cx: &Cx) {
        let Some(event) = name.strip_prefix("on") else {
            tracing::warn!(prop = %name, "handler on a prop that is not an event");
            return;
        };
        let id = ListenerId::new();
        let delegator = cx.delegation.as_ref().filter(|_| is_delegated(event)).cloned();
        match &delegator {
            Some(delegator) => delegator.register(node, event, Rc::clone(handler)),
            None => node.add_event_listener(event, id, Rc::clone(handler)),
        }
        self.listeners.insert(Rc::from(event), Listener { id, delegator });
    }

    /// Replace the handler of an event in place.
    fn swap_handler(&mut self, node: &Node, name: &str, handler: &EventHandler) {
        let Some(event) = name.strip_prefix("on") else {
            return;
        };
        let Some(listener) = self.listeners.get_mut(event) else {
            return;
        };
        match &listener.delegator {
            Some(delegator) => delegator.register(node, event, Rc::clone(handler)),
            None => {
                node.remove_event_listener(event, listener.id);
                listener.id = ListenerId::new();
                node.add_event_listener(event, listener.id, Rc::clone(handler));
            }
        }
    }

    /// Drop the listener or binding owned by `name`, if any.
    fn detach(&mut self, node: &Node, name: &str) {
        if let Some(event) = name.strip_prefix("on") {
            if let Some(listener) = self.listeners.shift_remove(event) {
                remove_listener(node, event, &listener);
            }
        }
        if let Some(binding) = self.bindings.shift_remove(name) {
            binding.dispose();
        }
    }
}

fn remove_listener(node: &Node, event: &str, listener: &Listener) {
    match &listener.delegator {
        Some(delegator) => delegator.unregister(node, event),
        None => node.remove_event_listener(event, listener.id),
    }
}

/// Keep `name` in sync with `source` through a local effect.
fn bind(node: &Node, name: &Rc<str>, source: Rc<dyn SignalSource>) -> Result<Effect> {
    let target = node.clone();
    let prop = Rc::clone(name);
    let binding = Effect::new_lazy(move || match source.read() {
        Ok(value) => {
            if let Err(err) = write_value(&target, &prop, &value) {
                tracing::warn!(%err, prop = %prop, "binding write failed");
            }
        }
        Err(err) => tracing::warn!(%err, prop = %prop, "binding read failed"),
    });
    if let Err(err) = binding.try_run() {
        binding.dispose();
        return Err(err);
    }
    Ok(binding)
}

fn write_value(node: &Node, name: &str, value: &Value) -> std::result::Result<(), DomError> {
    if name == "innerHTML" {
        return node.set_inner_html(&value.to_text());
    }
    match value.to_attribute() {
        Some(text) => node.set_attribute(name, &text),
        None => {
            node.remove_attribute(name);
            Ok(())
        }
    }
}

fn clear_attribute(node: &Node, name: &str, previous: &PropValue) -> Result<()> {
    match previous {
        PropValue::Handler(_) | PropValue::Data(_) | PropValue::Container(_) => {}
        _ if name == "innerHTML" => node.set_inner_html("")?,
        PropValue::Style(_) => node.remove_attribute("style"),
        _ => node.remove_attribute(name),
    }
    Ok(())
}
