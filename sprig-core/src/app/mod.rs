//! App Host
//!
//! [`create_app`] composes a root component with its options. The returned
//! [`App`] installs plugins, registers services (router, store) and
//! lifecycle listeners, and mounts the root into a container.
//!
//! # Mounting
//!
//! 1. The container is resolved from a selector or taken as a node.
//! 2. `app:beforeMount` fires.
//! 3. The root component is mounted; with [`EventMode::Delegated`] one
//!    listener per event is installed on the container.
//! 4. Post-commit callbacks (`use_effect`) run, then `app:mounted` fires.
//!
//! Errors no boundary catches are handed to the [`App::on_error`] handlers
//! and returned from `mount` or from the failing flush.

mod host;
mod lifecycle;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::component::{Component, Instance, InstanceSnapshot};
use crate::config::{AppOptions, EventMode};
use crate::dom::{document, DomError, Node};
use crate::error::{Error, Result};
use crate::reconciler::{Cx, MountedNode};
use crate::scheduler::{Scheduler, Ticker};
use crate::vnode::{create_vnode, PropMap};

pub(crate) use host::Host;
pub use lifecycle::{LifecycleEvent, LifecycleInfo};

/// An extension installed into an app.
pub trait Plugin {
    /// Plugins are installed once per app, by name.
    fn name(&self) -> &str;

    fn install(&self, app: &App) -> Result<()>;
}

/// Where to mount an app.
#[derive(Debug, Clone)]
pub enum MountTarget {
    Selector(String),
    Node(Node),
}

impl From<&str> for MountTarget {
    fn from(selector: &str) -> Self {
        MountTarget::Selector(selector.to_string())
    }
}

impl From<String> for MountTarget {
    fn from(selector: String) -> Self {
        MountTarget::Selector(selector)
    }
}

impl From<Node> for MountTarget {
    fn from(node: Node) -> Self {
        MountTarget::Node(node)
    }
}

impl From<&Node> for MountTarget {
    fn from(node: &Node) -> Self {
        MountTarget::Node(node.clone())
    }
}

struct Mounted {
    container: Node,
    cx: Cx,
    tree: MountedNode,
}

struct AppInner {
    root: Component,
    host: Rc<Host>,
    plugins: RefCell<Vec<String>>,
    mounted: RefCell<Option<Mounted>>,
}

/// A root component bound to its options, services and plugins.
#[derive(Clone)]
pub struct App(Rc<AppInner>);

/// Create an app rendering `root`.
pub fn create_app(root: Component, options: AppOptions) -> App {
    tracing::debug!(root = root.name(), ?options, "app created");
    App(Rc::new(AppInner {
        root,
        host: Host::new(&options),
        plugins: RefCell::new(Vec::new()),
        mounted: RefCell::new(None),
    }))
}

impl App {
    pub fn name(&self) -> Option<&str> {
        self.0.host.name.as_deref()
    }

    /// Install `plugin` unless a plugin with the same name already is.
    pub fn use_plugin<P: Plugin>(&self, plugin: P) -> Result<&Self> {
        let name = plugin.name().to_string();
        if self.0.plugins.borrow().contains(&name) {
            tracing::debug!(plugin = %name, "plugin already installed");
            return Ok(self);
        }
        plugin.install(self)?;
        tracing::debug!(plugin = %name, "plugin installed");
        self.0.plugins.borrow_mut().push(name);
        Ok(self)
    }

    pub fn plugins(&self) -> Vec<String> {
        self.0.plugins.borrow().clone()
    }

    /// Register a router; components reach it with `Scope::service`.
    pub fn use_router<R: 'static>(&self, router: R) -> &Self {
        self.provide(router)
    }

    /// Register a store; components reach it with `Scope::service`.
    pub fn use_store<S: 'static>(&self, store: S) -> &Self {
        self.provide(store)
    }

    /// Register a service by type. A later service of the same type wins.
    pub fn provide<T: 'static>(&self, service: T) -> &Self {
        self.0.host.provide_service(Rc::new(service));
        self
    }

    pub fn service<T: 'static>(&self) -> Option<Rc<T>> {
        self.0.host.service::<T>()
    }

    /// Listen for a lifecycle event.
    pub fn on(&self, event: LifecycleEvent, listener: impl Fn(&LifecycleInfo) + 'static) -> &Self {
        self.0.host.lifecycle.on(event, listener);
        self
    }

    /// Listen for every error reported by this app, caught or not.
    pub fn on_error(&self, handler: impl Fn(&Error) + 'static) -> &Self {
        self.0.host.errors.subscribe(handler);
        self
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.0.host.scheduler
    }

    pub fn set_ticker(&self, ticker: Rc<dyn Ticker>) -> &Self {
        self.0.host.scheduler.set_ticker(ticker);
        self
    }

    /// Run pending component updates now.
    pub fn flush(&self) -> Result<()> {
        self.0.host.scheduler.flush()
    }

    pub fn is_mounted(&self) -> bool {
        self.0.mounted.borrow().is_some()
    }

    /// The root component instance while mounted.
    pub fn root_instance(&self) -> Option<Instance> {
        self.0
            .mounted
            .borrow()
            .as_ref()
            .and_then(|m| m.tree.instance().cloned())
    }

    pub fn container(&self) -> Option<Node> {
        self.0.mounted.borrow().as_ref().map(|m| m.container.clone())
    }

    /// A serializable view of the mounted instance tree.
    pub fn snapshot(&self) -> Option<InstanceSnapshot> {
        self.root_instance().map(|root| root.snapshot())
    }

    /// Mount the root component into `target`.
    pub fn mount(&self, target: impl Into<MountTarget>) -> Result<MountHandle> {
        let container = match target.into() {
            MountTarget::Selector(selector) => document()
                .query_selector(&selector)
                .ok_or(DomError::SelectorNotFound(selector))?,
            MountTarget::Node(node) => node,
        };
        if self.is_mounted() {
            return Err(Error::Config(String::from("app is already mounted")));
        }

        let host = &self.0.host;
        let _span = tracing::debug_span!("app_mount", app = self.name().unwrap_or("app")).entered();
        host.emit(LifecycleEvent::AppBeforeMount, None, None);

        let mut cx = Cx::with_host(Rc::clone(host));
        if host.event_mode == EventMode::Delegated {
            cx = cx.with_delegation(&container);
        }
        let vnode = create_vnode(&self.0.root, PropMap::new(), Vec::new(), None, None);
        let tree = match MountedNode::mount(&vnode, &container, None, &cx) {
            Ok(tree) => tree,
            Err(err) => {
                host.report_error(&err, None);
                if let Some(delegator) = cx.delegator() {
                    delegator.dispose();
                }
                return Err(err);
            }
        };

        *self.0.mounted.borrow_mut() = Some(Mounted { container, cx, tree });
        host.scheduler.run_post_commit();
        host.emit(LifecycleEvent::AppMounted, None, None);
        Ok(MountHandle { app: self.clone() })
    }

    /// Unmount the root component. Does nothing when not mounted.
    pub fn unmount(&self) {
        let Some(mounted) = self.0.mounted.borrow_mut().take() else {
            return;
        };
        let host = &self.0.host;
        let _span = tracing::debug_span!("app_unmount", app = self.name().unwrap_or("app")).entered();
        host.emit(LifecycleEvent::AppBeforeUnmount, None, None);
        let Mounted { cx, tree, .. } = mounted;
        tree.unmount(&cx, true);
        if let Some(delegator) = cx.delegator() {
            delegator.dispose();
        }
        host.emit(LifecycleEvent::AppUnmounted, None, None);
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("root", &self.0.root)
            .field("name", &self.name())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

/// Returned by [`App::mount`].
#[derive(Debug, Clone)]
pub struct MountHandle {
    app: App,
}

impl MountHandle {
    pub fn unmount(&self) {
        self.app.unmount();
    }

    /// The root component instance.
    pub fn component(&self) -> Option<Instance> {
        self.app.root_instance()
    }

    pub fn app(&self) -> &App {
        &self.app
    }
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::component::define_component;
    use crate::vnode::h;
    use crate::children;

    fn hello() -> Component {
        define_component("Hello", |_, _| Ok(h("p", vec![], children!["hello"])))
    }

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn install(&self, app: &App) -> Result<()> {
            for event in LifecycleEvent::ALL {
                let log = self.0.clone();
                app.on(event, move |info| log.borrow_mut().push(info.event.as_str().to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn mounts_into_selector_and_unmounts() {
        let container = document().create_element("div");
        container.set_attribute("id", "app-root").unwrap();
        document().body().append_child(&container).unwrap();

        let app = create_app(hello(), AppOptions::default());
        let handle = app.mount("#app-root").unwrap();
        assert_eq!(container.text_content(), "hello");
        assert_eq!(handle.component().map(|i| i.name().to_string()).as_deref(), Some("Hello"));

        assert!(matches!(app.mount(&container), Err(Error::Config(_))));

        handle.unmount();
        assert_eq!(container.child_count(), 0);
        assert!(!app.is_mounted());
        container.remove();
    }

    #[test]
    fn missing_selector_is_an_error() {
        let app = create_app(hello(), AppOptions::default());
        let err = app.mount("#nowhere").unwrap_err();
        assert!(matches!(err, Error::Commit(DomError::SelectorNotFound(_))));
    }

    #[test]
    fn plugins_install_once_and_see_lifecycle() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let app = create_app(hello(), AppOptions::default());
        app.use_plugin(Recorder(log.clone())).unwrap();
        app.use_plugin(Recorder(log.clone())).unwrap();
        assert_eq!(app.plugins(), vec!["recorder"]);

        let handle = app.mount(document().create_element("div")).unwrap();
        handle.unmount();
        assert_eq!(
            *log.borrow(),
            vec![
                "app:beforeMount",
                "component:beforeCreate",
                "component:created",
                "component:beforeMount",
                "component:mounted",
                "app:mounted",
                "app:beforeUnmount",
                "component:beforeUnmount",
                "component:unmounted",
                "app:unmounted",
            ]
        );
    }

    #[test]
    fn services_reach_components() {
        struct Router {
            path: &'static str,
        }
        let root = define_component("Page", |cx, _| {
            let path = cx.service::<Router>().map(|r| r.path).unwrap_or("?");
            Ok(h("p", vec![], children![path]))
        });
        let app = create_app(root, AppOptions::default());
        app.use_router(Router { path: "/about" });
        let container = document().create_element("div");
        app.mount(&container).unwrap();
        assert_eq!(container.text_content(), "/about");
    }

    #[test]
    fn uncaught_errors_reach_the_channel() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let root = define_component("Broken", |_, _| Err(Error::render("no data")));
        let app = create_app(root, AppOptions::default());
        let s = seen.clone();
        app.on_error(move |err| s.borrow_mut().push(err.trace().to_vec()));

        let container = document().create_element("div");
        assert!(app.mount(&container).is_err());
        assert_eq!(*seen.borrow(), vec![vec![String::from("Broken")]]);
        assert_eq!(container.child_count(), 0);
    }
}
