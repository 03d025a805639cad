//! State shared by every instance of one app.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::lifecycle::{ErrorChannel, LifecycleBus, LifecycleEvent, LifecycleInfo};
use crate::component::Instance;
use crate::config::{AppOptions, EventMode};
use crate::error::Error;
use crate::scheduler::{select_ticker, Scheduler};

pub(crate) struct Host {
    pub(crate) scheduler: Scheduler,
    pub(crate) dev_mode: bool,
    pub(crate) event_mode: EventMode,
    pub(crate) name: Option<String>,
    pub(crate) lifecycle: LifecycleBus,
    pub(crate) errors: ErrorChannel,
    services: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

impl Host {
    pub(crate) fn new(options: &AppOptions) -> Rc<Self> {
        Rc::new(Self {
            scheduler: Scheduler::new(select_ticker(options.ticker)),
            dev_mode: options.dev_mode,
            event_mode: options.event_mode,
            name: options.name.clone(),
            lifecycle: LifecycleBus::default(),
            errors: ErrorChannel::default(),
            services: RefCell::new(HashMap::new()),
        })
    }

    pub(crate) fn emit(&self, event: LifecycleEvent, instance: Option<&Instance>, error: Option<&Error>) {
        if !self.lifecycle.has_listeners() {
            return;
        }
        self.lifecycle.emit(&LifecycleInfo {
            event,
            component: instance.map(|i| i.name().to_string()),
            instance: instance.map(Instance::id),
            error: error.cloned(),
        });
    }

    /// Log `err`, hand it to the error channel and emit `component:error`.
    pub(crate) fn report_error(&self, err: &Error, instance: Option<&Instance>) {
        tracing::error!(
            app = self.name.as_deref().unwrap_or("app"),
            component = instance.map(Instance::name),
            trace = ?err.trace(),
            %err,
            "component error"
        );
        self.errors.publish(err);
        self.emit(LifecycleEvent::ComponentError, instance, Some(err));
    }

    pub(crate) fn provide_service<T: 'static>(&self, service: Rc<T>) {
        self.services.borrow_mut().insert(TypeId::of::<T>(), service);
    }

    pub(crate) fn service<T: 'static>(&self) -> Option<Rc<T>> {
        let service = self.services.borrow().get(&TypeId::of::<T>()).cloned()?;
        service.downcast::<T>().ok()
    }
}
