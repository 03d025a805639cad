//! Error and suspense boundaries.

use std::fmt;
use std::rc::Rc;

use super::{Component, ComponentKind, WeakInstance};
use crate::error::Error;
use crate::vnode::{create_vnode, fragment_of, Child, PropMap, PropValue, VNode};

type Fallback = Rc<dyn Fn(&Error, &BoundaryHandle) -> VNode>;

thread_local! {
    static ERROR_BOUNDARY: Component = Component::builtin(
        "ErrorBoundary",
        ComponentKind::ErrorBoundary,
        |scope, props| {
            let (Some(error), Some(instance)) = (scope.caught_error(), scope.instance()) else {
                return Ok(fragment_of(props.children()));
            };
            match props.data::<Fallback>("fallback") {
                Some(fallback) => Ok(fallback(&error, &BoundaryHandle(instance.downgrade()))),
                None => Ok(fragment_of(&[])),
            }
        },
    );

    static SUSPENSE: Component = Component::builtin(
        "Suspense",
        ComponentKind::Suspense,
        |scope, props| {
            if scope.caught_error().is_none() {
                return Ok(fragment_of(props.children()));
            }
            Ok(props
                .data::<VNode>("fallback")
                .map(|fallback| (*fallback).clone())
                .unwrap_or_else(|| fragment_of(&[])))
        },
    );
}

/// Handle passed to an error boundary's fallback.
#[derive(Clone)]
pub struct BoundaryHandle(WeakInstance);

impl BoundaryHandle {
    /// Clear the caught error and render the children again in the next
    /// flush.
    pub fn reset(&self) {
        if let Some(instance) = self.0.upgrade() {
            instance.reset_boundary();
        }
    }

    /// The error currently shown by the fallback.
    pub fn error(&self) -> Option<Error> {
        self.0.upgrade().and_then(|instance| instance.caught_error())
    }
}

impl fmt::Debug for BoundaryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoundaryHandle")
            .field(&self.0.upgrade().map(|i| i.id()))
            .finish()
    }
}

/// Render `children`, or `fallback` once a render or commit error escapes
/// from them.
pub fn error_boundary(
    fallback: impl Fn(&Error, &BoundaryHandle) -> VNode + 'static,
    children: Vec<Child>,
) -> VNode {
    let fallback: Fallback = Rc::new(fallback);
    let mut props = PropMap::new();
    props.insert(Rc::from("fallback"), PropValue::data(fallback));
    ERROR_BOUNDARY.with(|component| create_vnode(component, props, children, None, None))
}

/// Render `children`, or `fallback` while a resource read below is pending.
/// The children render again once the resource settles.
pub fn suspense(fallback: VNode, children: Vec<Child>) -> VNode {
    let mut props = PropMap::new();
    props.insert(Rc::from("fallback"), PropValue::data(fallback));
    SUSPENSE.with(|component| create_vnode(component, props, children, None, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::component::define_component;
    use crate::config::AppOptions;
    use crate::dom::document;
    use crate::reactive::Resource;
    use crate::reconciler::{Cx, MountedNode};
    use crate::vnode::h;
    use crate::children;

    #[test]
    fn suspense_shows_fallback_until_resolved() {
        let resource: Resource<String> = Resource::new();
        let r = resource.clone();
        let loader = define_component("Loader", move |_, _| {
            let text = r.read()?;
            Ok(h("p", vec![], children![text]))
        });
        let tree = suspense(
            h("i", vec![], children!["loading"]),
            children![loader.vnode(vec![], vec![])],
        );

        let cx = Cx::new(&AppOptions::default());
        let root = document().create_element("div");
        let _mounted = MountedNode::mount(&tree, &root, None, &cx).unwrap();
        assert_eq!(root.text_content(), "loading");

        resource.resolve(String::from("done"));
        cx.scheduler().flush().unwrap();
        assert_eq!(root.text_content(), "done");
    }

    #[test]
    fn nested_boundary_catches_first() {
        let outer_seen = Rc::new(RefCell::new(0));
        let o = outer_seen.clone();
        let buggy = define_component("Buggy", |_, _| Err(Error::render("inner")));
        let tree = error_boundary(
            move |_, _| {
                *o.borrow_mut() += 1;
                h("p", vec![], children!["outer"])
            },
            children![error_boundary(
                |_, _| h("p", vec![], children!["inner"]),
                children![buggy.vnode(vec![], vec![])],
            )],
        );

        let cx = Cx::new(&AppOptions::default());
        let root = document().create_element("div");
        let _mounted = MountedNode::mount(&tree, &root, None, &cx).unwrap();
        assert_eq!(root.text_content(), "inner");
        assert_eq!(*outer_seen.borrow(), 0);
    }
}
