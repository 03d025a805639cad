//! Lifecycle hooks and the global error channel.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::error::Error;

/// A named point in the life of an app or a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LifecycleEvent {
    AppBeforeMount,
    AppMounted,
    AppBeforeUnmount,
    AppUnmounted,
    ComponentBeforeCreate,
    ComponentCreated,
    ComponentBeforeMount,
    ComponentMounted,
    ComponentBeforeUpdate,
    ComponentUpdated,
    ComponentBeforeUnmount,
    ComponentUnmounted,
    ComponentError,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 13] = [
        LifecycleEvent::AppBeforeMount,
        LifecycleEvent::AppMounted,
        LifecycleEvent::AppBeforeUnmount,
        LifecycleEvent::AppUnmounted,
        LifecycleEvent::ComponentBeforeCreate,
        LifecycleEvent::ComponentCreated,
        LifecycleEvent::ComponentBeforeMount,
        LifecycleEvent::ComponentMounted,
        LifecycleEvent::ComponentBeforeUpdate,
        LifecycleEvent::ComponentUpdated,
        LifecycleEvent::ComponentBeforeUnmount,
        LifecycleEvent::ComponentUnmounted,
        LifecycleEvent::ComponentError,
    ];

    /// The hook name plugins subscribe to, e.g. `component:mounted`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::AppBeforeMount => "app:beforeMount",
            LifecycleEvent::AppMounted => "app:mounted",
            LifecycleEvent::AppBeforeUnmount => "app:beforeUnmount",
            LifecycleEvent::AppUnmounted => "app:unmounted",
            LifecycleEvent::ComponentBeforeCreate => "component:beforeCreate",
            LifecycleEvent::ComponentCreated => "component:created",
            LifecycleEvent::ComponentBeforeMount => "component:beforeMount",
            LifecycleEvent::ComponentMounted => "component:mounted",
            LifecycleEvent::ComponentBeforeUpdate => "component:beforeUpdate",
            LifecycleEvent::ComponentUpdated => "component:updated",
            LifecycleEvent::ComponentBeforeUnmount => "component:beforeUnmount",
            LifecycleEvent::ComponentUnmounted => "component:unmounted",
            LifecycleEvent::ComponentError => "component:error",
        }
    }

    /// Parse a hook name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a lifecycle listener is told.
#[derive(Debug, Clone)]
pub struct LifecycleInfo {
    pub event: LifecycleEvent,
    /// Component name, for `component:*` events.
    pub component: Option<String>,
    /// Instance id, for `component:*` events.
    pub instance: Option<u64>,
    /// The reported error, for `component:error`.
    pub error: Option<Error>,
}

type LifecycleListener = Rc<dyn Fn(&LifecycleInfo)>;

/// Listeners by lifecycle event.
#[derive(Default)]
pub(crate) struct LifecycleBus {
    listeners: RefCell<Vec<(LifecycleEvent, LifecycleListener)>>,
}

impl LifecycleBus {
    pub(crate) fn on(&self, event: LifecycleEvent, listener: impl Fn(&LifecycleInfo) + 'static) {
        self.listeners.borrow_mut().push((event, Rc::new(listener)));
    }

    pub(crate) fn has_listeners(&self) -> bool {
        !self.listeners.borrow().is_empty()
    }

    pub(crate) fn emit(&self, info: &LifecycleInfo) {
        let listeners: Vec<LifecycleListener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(event, _)| *event == info.event)
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(info);
        }
    }
}

type ErrorHandler = Rc<dyn Fn(&Error)>;

/// Handlers that see every reported error, caught or not.
#[derive(Default)]
pub(crate) struct ErrorChannel {
    handlers: RefCell<Vec<ErrorHandler>>,
}

impl ErrorChannel {
    pub(crate) fn subscribe(&self, handler: impl Fn(&Error) + 'static) {
        self.handlers.borrow_mut().push(Rc::new(handler));
    }

    pub(crate) fn publish(&self, err: &Error) {
        let handlers = self.handlers.borrow().clone();
        for handler in handlers {
            handler(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn names_round_trip() {
        for event in LifecycleEvent::ALL {
            assert_eq!(LifecycleEvent::from_name(event.as_str()), Some(event));
        }
        assert_eq!(LifecycleEvent::from_name("component:exploded"), None);
    }

    #[test]
    fn bus_filters_by_event() {
        let bus = LifecycleBus::default();
        let mounted = Rc::new(Cell::new(0));
        let m = mounted.clone();
        bus.on(LifecycleEvent::ComponentMounted, move |info| {
            assert_eq!(info.component.as_deref(), Some("Card"));
            m.set(m.get() + 1);
        });

        for event in [LifecycleEvent::ComponentMounted, LifecycleEvent::ComponentUpdated] {
            bus.emit(&LifecycleInfo {
                event,
                component: Some(String::from("Card")),
                instance: Some(1),
                error: None,
            });
        }
        assert_eq!(mounted.get(), 1);
    }
}
