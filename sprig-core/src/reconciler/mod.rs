//! Reconciler
//!
//! The reconciler turns vnodes into DOM and keeps the DOM in step with the
//! next vnode tree. The state it keeps per vnode is a [`MountedNode`]: the
//! vnode last applied, the DOM it owns, its listeners, binding effects and
//! mounted children.
//!
//! # Patching
//!
//! 1. A node whose type or key changed is replaced: the new node is mounted
//!    before the old one, then the old one is unmounted.
//! 2. Text nodes update their data. Element props are diffed one by one;
//!    signal props get a binding effect that writes the attribute on change
//!    without re-rendering the component.
//! 3. Children are matched by key first, then by position among the unkeyed
//!    ones. Survivors are patched and moved only when they are not already
//!    in place; the rest are unmounted.
//! 4. A component node hands its new props to the instance, which renders
//!    again inline.
//!
//! # Design Decisions
//!
//! - Fragments own a pair of comment markers so the reconciler always has a
//!   DOM node to insert before, even when the fragment is empty.
//! - Portals leave a comment where they would have been; their children live
//!   in the portal container and are unmounted with the portal.
//! - A failed mount leaves no DOM behind. A failed patch leaves a tree that
//!   can still be patched or unmounted.

mod children;
mod delegate;
mod mounted;
mod props;

use std::rc::Rc;

use crate::app::Host;
use crate::component::Instance;
use crate::config::AppOptions;
use crate::dom::Node;
use crate::error::Result;
use crate::scheduler::Scheduler;
use crate::vnode::VNode;

pub use children::reconcile_children;
pub use delegate::{is_delegated, Delegator, DELEGATED_EVENTS};
pub use mounted::MountedNode;

/// Context threaded through mount and patch: the app host, the component
/// instance that owns the nodes and the active event delegator.
#[derive(Clone)]
pub struct Cx {
    pub(crate) host: Rc<Host>,
    pub(crate) owner: Option<Instance>,
    pub(crate) delegation: Option<Rc<Delegator>>,
}

impl Cx {
    /// A standalone context with its own scheduler.
    pub fn new(options: &AppOptions) -> Self {
        Self::with_host(Host::new(options))
    }

    pub(crate) fn with_host(host: Rc<Host>) -> Self {
        Self {
            host,
            owner: None,
            delegation: None,
        }
    }

    /// Route delegable events through one listener per event on
    /// `container`.
    pub fn with_delegation(mut self, container: &Node) -> Self {
        self.delegation = Some(Delegator::new(container));
        self
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.host.scheduler
    }

    pub fn owner(&self) -> Option<&Instance> {
        self.owner.as_ref()
    }

    pub fn delegator(&self) -> Option<&Rc<Delegator>> {
        self.delegation.as_ref()
    }

    /// Portal children do not bubble to the app container.
    pub(crate) fn for_portal(&self) -> Self {
        Self {
            host: Rc::clone(&self.host),
            owner: self.owner.clone(),
            delegation: None,
        }
    }
}

/// Reconcile `slot` against `next` under `parent`.
///
/// - nothing to something: mount before `before`;
/// - something to nothing: unmount and remove the DOM;
/// - otherwise patch in place.
pub fn reconcile(
    slot: &mut Option<MountedNode>,
    next: Option<&VNode>,
    parent: &Node,
    before: Option<&Node>,
    cx: &Cx,
) -> Result<()> {
    match (slot.as_mut(), next) {
        (None, None) => Ok(()),
        (Some(_), None) => {
            if let Some(mounted) = slot.take() {
                mounted.unmount(cx, true);
            }
            Ok(())
        }
        (None, Some(vnode)) => {
            *slot = Some(MountedNode::mount(vnode, parent, before, cx)?);
            Ok(())
        }
        (Some(mounted), Some(vnode)) => mounted.patch(vnode, parent, cx),
    }
}

// ---- Tests ----
