//! Components
//!
//! A [`Component`] is a named render function from props to a vnode. Each
//! occurrence of a component in a rendered tree gets its own [`Instance`],
//! which owns the hook slots, one long-lived render effect and the DOM the
//! render produced.
//!
//! # Instance Lifecycle
//!
//! ```text
//! created ──mount──▶ mounted ◀──▶ updating
//!                       │
//!                    unmount
//!                       ▼
//!                   unmounted
//! ```
//!
//! - **create**: allocate hooks and the (lazy) render effect.
//! - **mount**: run the render under tracking, commit its vnode, then run
//!   effects queued for post-commit.
//! - **update**: scheduled when a signal read during render changes, or run
//!   inline when the parent passes new props.
//! - **unmount**: dispose the render effect, run hook cleanups in reverse,
//!   unmount child instances, then remove the DOM.
//!
//! Render and commit errors travel up the instance tree to the nearest
//! [`error_boundary`]; pending resources travel up to the nearest
//! [`suspense`] boundary.

mod boundary;
mod instance;

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::error::Result;
use crate::hooks::Scope;
use crate::vnode::{h, Child, PropValue, Props, VNode};

pub use boundary::{error_boundary, suspense, BoundaryHandle};
pub use instance::Instance;
pub(crate) use instance::WeakInstance;

/// A component render function.
pub type RenderFn = Rc<dyn Fn(&Scope, &Props) -> Result<VNode>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ComponentKind {
    Plain,
    ErrorBoundary,
    Suspense,
}

struct ComponentDef {
    name: Rc<str>,
    render: RenderFn,
    kind: ComponentKind,
}

/// A component constructor. Compares by identity.
#[derive(Clone)]
pub struct Component(Rc<ComponentDef>);

impl Component {
    pub(crate) fn builtin(
        name: &str,
        kind: ComponentKind,
        render: impl Fn(&Scope, &Props) -> Result<VNode> + 'static,
    ) -> Self {
        Self(Rc::new(ComponentDef {
            name: Rc::from(name),
            render: Rc::new(render),
            kind,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// A vnode rendering this component, as a JSX factory call would.
    pub fn vnode<'a>(
        &self,
        props: impl IntoIterator<Item = (&'a str, PropValue)>,
        children: Vec<Child>,
    ) -> VNode {
        h(self, props, children)
    }

    pub(crate) fn render_fn(&self) -> &RenderFn {
        &self.0.render
    }

    pub(crate) fn kind(&self) -> ComponentKind {
        self.0.kind
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.0.name).finish()
    }
}

/// Define a component from a render function.
///
/// # Example
///
/// ```rust,ignore
/// let greeting = define_component("Greeting", |_cx, props| {
///     let name = props.str("name").unwrap_or("world").to_string();
///     Ok(h("p", vec![], children!["Hello, ", name]))
/// });
/// ```
pub fn define_component(
    name: &str,
    render: impl Fn(&Scope, &Props) -> Result<VNode> + 'static,
) -> Component {
    Component::builtin(name, ComponentKind::Plain, render)
}

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Created,
    Mounted,
    Updating,
    Unmounted,
}

/// A serializable view of an instance subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSnapshot {
    pub id: u64,
    pub name: String,
    pub state: InstanceState,
    pub hooks: usize,
    pub renders: usize,
    pub children: Vec<InstanceSnapshot>,
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use crate::config::AppOptions;
    use crate::dom::{document, Event, Node};
    use crate::error::Error;
    use crate::hooks::create_context;
    use crate::reactive::signal;
    use crate::reconciler::{Cx, MountedNode};
    use crate::vnode::fragment;
    use crate::{children, props};

    fn mount(vnode: &VNode) -> (Node, MountedNode, Cx) {
        let cx = Cx::new(&AppOptions::default().with_dev_mode(true));
        let root = document().create_element("div");
        let mounted = MountedNode::mount(vnode, &root, None, &cx).unwrap();
        cx.scheduler().run_post_commit();
        (root, mounted, cx)
    }

    #[test]
    fn state_setter_schedules_rerender() {
        let setter = Rc::new(RefCell::new(None));
        let s = setter.clone();
        let counter = define_component("Counter", move |cx, _| {
            let (count, set_count) = cx.use_state(0)?;
            *s.borrow_mut() = Some(set_count);
            Ok(h("span", vec![], children![count]))
        });

        let (root, mounted, cx) = mount(&counter.vnode(vec![], vec![]));
        assert_eq!(root.text_content(), "0");

        let set_count = setter.borrow().unwrap();
        set_count.update(|c| c + 5);
        assert_eq!(root.text_content(), "0");
        assert_eq!(cx.scheduler().pending(), 1);

        cx.scheduler().flush().unwrap();
        assert_eq!(root.text_content(), "5");

        let instance = mounted.instance().unwrap().clone();
        assert_eq!(instance.render_count(), 2);
        assert_eq!(instance.hook_count(), 1);
    }

    #[test]
    fn use_effect_follows_deps() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let dep = signal(1);
        let l = log.clone();
        let watcher = define_component("Watcher", move |cx, _| {
            let value = dep.get();
            let l = l.clone();
            cx.use_effect(
                move || {
                    l.borrow_mut().push(format!("run {value}"));
                    let l = l.clone();
                    move || l.borrow_mut().push(format!("cleanup {value}"))
                },
                Some(value / 2),
            )?;
            Ok(h("i", vec![], vec![]))
        });

        let (_root, mounted, cx) = mount(&watcher.vnode(vec![], vec![]));
        assert_eq!(*log.borrow(), vec!["run 1"]);

        dep.set(2);
        cx.scheduler().flush().unwrap();
        dep.set(3);
        cx.scheduler().flush().unwrap();
        assert_eq!(*log.borrow(), vec!["run 1", "cleanup 1", "run 2"]);

        mounted.unmount(&cx, true);
        assert_eq!(log.borrow().last().map(String::as_str), Some("cleanup 2"));
    }

    #[test]
    fn memo_and_ref_are_stable() {
        let computes = Rc::new(Cell::new(0));
        let refs = Rc::new(RefCell::new(Vec::new()));
        let tick = signal(0);
        let (c, r) = (computes.clone(), refs.clone());
        let memo = define_component("Memo", move |cx, _| {
            tick.get();
            let c = c.clone();
            let doubled = cx.use_memo(
                move || {
                    c.set(c.get() + 1);
                    21 * 2
                },
                Some(()),
            )?;
            let cell = cx.use_ref(0usize)?;
            cell.with_mut(|n| *n += 1);
            r.borrow_mut().push(cell.clone());
            Ok(h("b", vec![], children![doubled]))
        });

        let (root, _mounted, cx) = mount(&memo.vnode(vec![], vec![]));
        tick.set(1);
        cx.scheduler().flush().unwrap();

        assert_eq!(root.text_content(), "42");
        assert_eq!(computes.get(), 1);
        let refs = refs.borrow();
        assert!(refs[0].ptr_eq(&refs[1]));
        assert_eq!(refs[1].current(), 2);
    }

    #[test]
    fn context_reaches_descendants() {
        let theme = create_context(String::from("light"));
        let t = theme.clone();
        let reader = define_component("Reader", move |cx, _| {
            let value = cx.use_context(&t)?;
            Ok(h("em", vec![], children![value]))
        });

        let tree = fragment(children![
            reader.vnode(vec![], vec![]),
            theme.provider("dark".to_string(), children![reader.vnode(vec![], vec![])]),
        ]);
        let (root, _mounted, _cx) = mount(&tree);
        assert_eq!(root.text_content(), "lightdark");
    }

    #[test]
    fn hooks_outside_render_are_rejected() {
        let stash = Rc::new(RefCell::new(None));
        let s = stash.clone();
        let leaky = define_component("Leaky", move |cx, _| {
            *s.borrow_mut() = Some(cx.clone());
            Ok(fragment(vec![]))
        });
        let (_root, _mounted, _cx) = mount(&leaky.vnode(vec![], vec![]));

        let scope = stash.borrow().clone().unwrap();
        assert!(matches!(scope.use_state(1), Err(Error::HookContextMissing)));
    }

    #[test]
    fn changing_hook_count_is_reported() {
        let flag = signal(false);
        let shifty = define_component("Shifty", move |cx, _| {
            if flag.get() {
                cx.use_state(1)?;
            }
            cx.use_state(2)?;
            Ok(fragment(vec![]))
        });

        let (_root, _mounted, cx) = mount(&shifty.vnode(vec![], vec![]));
        flag.set(true);
        let err = cx.scheduler().flush().unwrap_err();
        assert!(matches!(err, Error::HookOrderMismatch { .. }));
    }

    #[test]
    fn boundary_catches_and_resets() {
        let broken = signal(true);
        let buggy = define_component("Buggy", move |_, _| {
            if broken.get_untracked() {
                return Err(Error::render("kaboom"));
            }
            Ok(h("p", vec![], children!["fine"]))
        });
        let handle = Rc::new(RefCell::new(None));
        let hd = handle.clone();
        let tree = error_boundary(
            move |err, boundary| {
                *hd.borrow_mut() = Some(boundary.clone());
                h("p", props! { "class" => "fallback" }, children![err.to_string()])
            },
            children![buggy.vnode(vec![], vec![])],
        );

        let (root, _mounted, cx) = mount(&tree);
        assert!(root.text_content().contains("kaboom"));
        assert!(root.query_selector(".fallback").is_some());

        let boundary = handle.borrow().clone().unwrap();
        assert!(boundary.error().is_some_and(|e| e.trace() == ["Buggy", "ErrorBoundary"]));

        // Still broken: caught again.
        boundary.reset();
        cx.scheduler().flush().unwrap();
        assert!(root.query_selector(".fallback").is_some());

        broken.set(false);
        boundary.reset();
        cx.scheduler().flush().unwrap();
        assert_eq!(root.text_content(), "fine");
    }

    #[test]
    fn handlers_see_fresh_state() {
        let clicker = define_component("Clicker", |cx, _| {
            let (n, set_n) = cx.use_state(0)?;
            Ok(h(
                "button",
                props! { "onClick" => PropValue::handler(move |_| set_n.update(|v| v + 1)) },
                children![n],
            ))
        });
        let (root, _mounted, cx) = mount(&clicker.vnode(vec![], vec![]));
        let button = root.query_selector("button").unwrap();

        button.dispatch_event(&Event::new("click"));
        cx.scheduler().flush().unwrap();
        button.dispatch_event(&Event::new("click"));
        cx.scheduler().flush().unwrap();
        assert_eq!(button.text_content(), "2");
    }
}
