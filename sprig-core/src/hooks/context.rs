//! Context descriptors.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::component::{define_component, Component};
use crate::vnode::{create_vnode, fragment_of, Child, PropMap, PropValue, VNode};

/// Counter for generating unique context ids.
static CONTEXT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

struct ContextInner<T> {
    id: u64,
    default: T,
    provider: Component,
}

/// A value passed down the instance tree without threading props.
pub struct Context<T>(Rc<ContextInner<T>>);

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: 'static> Context<T> {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn default_value(&self) -> &T {
        &self.0.default
    }

    /// The provider component of this context.
    pub fn provider_component(&self) -> &Component {
        &self.0.provider
    }

    /// A provider vnode making `value` visible to every descendant of
    /// `children`.
    pub fn provider(&self, value: T, children: Vec<Child>) -> VNode {
        let mut props = PropMap::new();
        props.insert(Rc::from("value"), PropValue::data(value));
        create_vnode(&self.0.provider, props, children, None, None)
    }
}

impl<T> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("id", &self.0.id).finish()
    }
}

/// Create a context whose consumers see `default` when no provider is
/// above them.
pub fn create_context<T: Clone + 'static>(default: T) -> Context<T> {
    let id = CONTEXT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let provider = define_component("ContextProvider", move |scope, props| {
        match props.data::<T>("value") {
            Some(value) => scope.provide_any(id, value)?,
            None => tracing::warn!(context = id, "provider rendered without a value"),
        }
        Ok(fragment_of(props.children()))
    });
    Context(Rc::new(ContextInner {
        id,
        default,
        provider,
    }))
}
