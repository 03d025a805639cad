//! Component instances.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Component, ComponentKind, InstanceSnapshot, InstanceState};
use crate::app::{Host, LifecycleEvent};
use crate::dom::{document, Node};
use crate::error::{Error, Result};
use crate::hooks::{HookState, Scope};
use crate::reactive::{Effect, EffectOptions, Signal};
use crate::reconciler::{reconcile, Cx, Delegator, MountedNode};
use crate::scheduler::{Scheduler, UpdateTarget};
use crate::vnode::{Props, VNode};

/// Counter for generating unique instance ids.
static INSTANCE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Current props of an instance. Compares by identity so every new set of
/// props from the parent counts as a change.
#[derive(Clone)]
struct PropsHandle(Rc<Props>);

impl PartialEq for PropsHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

pub(crate) struct InstanceInner {
    id: u64,
    component: Component,
    host: Rc<Host>,
    delegation: Option<Rc<Delegator>>,
    parent: Option<WeakInstance>,
    props: Signal<PropsHandle>,
    hooks: HookState,
    render_effect: Cell<Option<Effect>>,
    /// Output of the last render effect run, taken by the commit.
    output: RefCell<Option<Result<VNode>>>,
    rendered: RefCell<Option<MountedNode>>,
    /// Comment node marking the end of this instance's DOM.
    anchor: Node,
    state: Cell<InstanceState>,
    dirty: Cell<bool>,
    /// Set while the parent writes new props; the inline re-render covers it.
    receiving: Cell<bool>,
    contexts: RefCell<HashMap<u64, Rc<dyn Any>>>,
    caught: RefCell<Option<Error>>,
}

/// A live occurrence of a component in the rendered tree.
#[derive(Clone)]
pub struct Instance(Rc<InstanceInner>);

/// A non-owning instance handle.
#[derive(Clone)]
pub(crate) struct WeakInstance(Weak<InstanceInner>);

impl WeakInstance {
    pub(crate) fn upgrade(&self) -> Option<Instance> {
        self.0.upgrade().map(Instance)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Instance {}

impl Instance {
    /// Allocate an instance for a component vnode. Nothing is rendered yet.
    pub(crate) fn create(vnode: &VNode, component: &Component, cx: &Cx) -> Result<Self> {
        let props = Signal::try_new(PropsHandle(Rc::new(vnode.component_props())))?;
        let instance = Instance(Rc::new(InstanceInner {
            id: INSTANCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            component: component.clone(),
            host: Rc::clone(&cx.host),
            delegation: cx.delegation.clone(),
            parent: cx.owner.as_ref().map(Instance::downgrade),
            props,
            hooks: HookState::default(),
            render_effect: Cell::new(None),
            output: RefCell::new(None),
            rendered: RefCell::new(None),
            anchor: document().create_comment(""),
            state: Cell::new(InstanceState::Created),
            dirty: Cell::new(false),
            receiving: Cell::new(false),
            contexts: RefCell::new(HashMap::new()),
            caught: RefCell::new(None),
        }));
        instance.emit(LifecycleEvent::ComponentBeforeCreate);

        let body = instance.downgrade();
        let trigger = instance.downgrade();
        let effect = Effect::with_options(
            move || {
                if let Some(instance) = body.upgrade() {
                    let output = instance.call_render();
                    *instance.0.output.borrow_mut() = Some(output);
                }
            },
            EffectOptions {
                immediate: false,
                on_trigger: Some(Rc::new(move || {
                    if let Some(instance) = trigger.upgrade() {
                        if !instance.0.receiving.get() {
                            instance.schedule_update();
                        }
                    }
                })),
            },
        );
        instance.0.render_effect.set(Some(effect));

        instance.emit(LifecycleEvent::ComponentCreated);
        Ok(instance)
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        self.0.component.name()
    }

    pub fn component(&self) -> &Component {
        &self.0.component
    }

    pub fn state(&self) -> InstanceState {
        self.0.state.get()
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self.state(), InstanceState::Mounted | InstanceState::Updating)
    }

    /// Number of times the render effect has run.
    pub fn render_count(&self) -> usize {
        self.render_effect().map_or(0, |effect| effect.run_count())
    }

    pub fn hook_count(&self) -> usize {
        self.0.hooks.len()
    }

    pub fn parent(&self) -> Option<Instance> {
        self.0.parent.as_ref().and_then(WeakInstance::upgrade)
    }

    /// The current props.
    pub fn props(&self) -> Option<Rc<Props>> {
        self.0.props.try_get_untracked().ok().map(|handle| handle.0)
    }

    /// Top-level DOM nodes of this instance, in document order. The last
    /// one is the instance's end marker.
    pub fn dom_nodes(&self) -> Vec<Node> {
        let mut nodes = self
            .0
            .rendered
            .borrow()
            .as_ref()
            .map(MountedNode::dom_nodes)
            .unwrap_or_default();
        nodes.push(self.0.anchor.clone());
        nodes
    }

    pub(crate) fn first_dom(&self) -> Node {
        self.0
            .rendered
            .borrow()
            .as_ref()
            .map(MountedNode::first_dom)
            .unwrap_or_else(|| self.0.anchor.clone())
    }

    pub(crate) fn last_dom(&self) -> Node {
        self.0.anchor.clone()
    }

    /// Listeners attached by this instance's DOM, descendants included.
    pub fn listener_count(&self) -> usize {
        self.0
            .rendered
            .borrow()
            .as_ref()
            .map_or(0, MountedNode::listener_count)
    }

    /// Instances created by this instance's last render.
    pub fn children(&self) -> Vec<Instance> {
        let mut out = Vec::new();
        if let Some(rendered) = self.0.rendered.borrow().as_ref() {
            rendered.collect_instances(&mut out);
        }
        out
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            id: self.id(),
            name: self.name().to_string(),
            state: self.state(),
            hooks: self.hook_count(),
            renders: self.render_count(),
            children: self.children().iter().map(Instance::snapshot).collect(),
        }
    }

    /// Queue a re-render for the next flush.
    pub fn schedule_update(&self) {
        if !self.is_live() {
            return;
        }
        self.0.dirty.set(true);
        let target: Rc<dyn UpdateTarget> = self.0.clone();
        self.0.host.scheduler.schedule_update(target);
    }

    pub(crate) fn downgrade(&self) -> WeakInstance {
        WeakInstance(Rc::downgrade(&self.0))
    }

    pub(crate) fn hooks(&self) -> &HookState {
        &self.0.hooks
    }

    pub(crate) fn dev_mode(&self) -> bool {
        self.0.host.dev_mode
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.0.host.scheduler
    }

    pub(crate) fn service<T: 'static>(&self) -> Option<Rc<T>> {
        self.0.host.service::<T>()
    }

    /// Not yet unmounted.
    pub(crate) fn is_live(&self) -> bool {
        self.state() != InstanceState::Unmounted
    }

    pub(crate) fn provide(&self, id: u64, value: Rc<dyn Any>) {
        self.0.contexts.borrow_mut().insert(id, value);
    }

    pub(crate) fn provided(&self, id: u64) -> Option<Rc<dyn Any>> {
        self.0.contexts.borrow().get(&id).cloned()
    }

    pub(crate) fn caught_error(&self) -> Option<Error> {
        self.0.caught.borrow().clone()
    }

    fn render_effect(&self) -> Option<Effect> {
        self.0.render_effect.get()
    }

    fn child_cx(&self) -> Cx {
        Cx {
            host: Rc::clone(&self.0.host),
            owner: Some(self.clone()),
            delegation: self.0.delegation.clone(),
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        self.0.host.emit(event, Some(self), None);
    }

    // =========================================================================
    // RENDER AND COMMIT
    // =========================================================================

    /// Run the user render function. Called inside the render effect, so
    /// signal reads subscribe the instance.
    fn call_render(&self) -> Result<VNode> {
        let _span = tracing::debug_span!("render", component = %self.name(), id = self.id()).entered();
        let props = self.0.props.try_get()?;
        let hooks = &self.0.hooks;
        hooks.begin_render();
        let scope = Scope::new(self);
        let output = (self.0.component.render_fn())(&scope, props.0.as_ref());
        let closed = hooks.end_render(output.is_ok(), self.dev_mode());
        let vnode = output?;
        closed?;
        Ok(vnode)
    }

    /// Render and reconcile the output before the anchor. Errors this
    /// instance is a boundary for are caught here.
    fn render_and_commit(&self, parent: &Node) -> Result<()> {
        match self.render_and_commit_inner(parent) {
            Ok(()) => Ok(()),
            Err(err) if self.catches(&err) => self.catch(err, parent),
            Err(err) => Err(err.with_component(self.name())),
        }
    }

    fn render_and_commit_inner(&self, parent: &Node) -> Result<()> {
        let Some(effect) = self.render_effect() else {
            return Ok(());
        };
        effect.try_run()?;
        let output = self.0.output.borrow_mut().take();
        let vnode = output.unwrap_or_else(|| Err(Error::render("render produced no output")))?;

        let cx = self.child_cx();
        let mut slot = self.0.rendered.borrow_mut().take();
        let result = reconcile(&mut slot, Some(&vnode), parent, Some(&self.0.anchor), &cx);
        *self.0.rendered.borrow_mut() = slot;
        result
    }

    /// Insert the anchor at `before`, render, and commit. On failure no DOM
    /// is left behind.
    pub(crate) fn mount(&self, parent: &Node, before: Option<&Node>) -> Result<()> {
        let _span = tracing::debug_span!("mount", component = %self.name(), id = self.id()).entered();
        self.emit(LifecycleEvent::ComponentBeforeMount);
        parent.insert_before(&self.0.anchor, before)?;
        match self.render_and_commit(parent) {
            Ok(()) => {
                self.0.state.set(InstanceState::Mounted);
                self.emit(LifecycleEvent::ComponentMounted);
                Ok(())
            }
            Err(err) => {
                self.discard(true);
                Err(err)
            }
        }
    }

    /// Re-render with new props from the parent, synchronously.
    pub(crate) fn receive(&self, vnode: &VNode) -> Result<()> {
        self.0.receiving.set(true);
        let written = self
            .0
            .props
            .try_set(PropsHandle(Rc::new(vnode.component_props())));
        self.0.receiving.set(false);
        written?;
        self.rerender()
    }

    /// Scheduled re-render. Failures are routed to the nearest boundary.
    fn update(&self) -> Result<()> {
        match self.rerender() {
            Ok(()) => Ok(()),
            Err(err) => self.route_error(err),
        }
    }

    fn rerender(&self) -> Result<()> {
        if !self.is_mounted() {
            return Ok(());
        }
        let Some(parent) = self.0.anchor.parent() else {
            return Ok(());
        };
        let _span = tracing::debug_span!("update", component = %self.name(), id = self.id()).entered();
        self.0.dirty.set(false);
        self.emit(LifecycleEvent::ComponentBeforeUpdate);
        self.0.state.set(InstanceState::Updating);
        let result = self.render_and_commit(&parent);
        if self.state() == InstanceState::Updating {
            self.0.state.set(InstanceState::Mounted);
        }
        if result.is_ok() {
            self.emit(LifecycleEvent::ComponentUpdated);
        }
        result
    }

    // =========================================================================
    // ERROR BOUNDARIES
    // =========================================================================

    fn catches(&self, err: &Error) -> bool {
        if self.0.caught.borrow().is_some() {
            return false;
        }
        match self.0.component.kind() {
            ComponentKind::Plain => false,
            ComponentKind::ErrorBoundary => err.is_boundary_error(),
            ComponentKind::Suspense => matches!(err, Error::Pending(_)),
        }
    }

    /// Tear down the current output, record `err` and render the fallback.
    fn catch(&self, err: Error, parent: &Node) -> Result<()> {
        if let Error::Pending(token) = &err {
            tracing::debug!(boundary = self.id(), token = token.id(), "suspended");
        } else {
            let mut full = err.clone().with_component(self.name());
            let mut current = self.parent();
            while let Some(ancestor) = current {
                full = full.with_component(ancestor.name());
                current = ancestor.parent();
            }
            self.0.host.report_error(&full, Some(self));
        }

        let previous = self.0.rendered.borrow_mut().take();
        if let Some(previous) = previous {
            previous.unmount(&self.child_cx(), true);
        }

        let token = match &err {
            Error::Pending(token) => Some(token.clone()),
            _ => None,
        };
        *self.0.caught.borrow_mut() = Some(err.with_component(self.name()));
        if let Some(token) = token {
            let boundary = self.downgrade();
            token.on_resolve(move || {
                if let Some(boundary) = boundary.upgrade() {
                    boundary.reset_boundary();
                }
            });
        }

        self.render_and_commit_inner(parent)
            .map_err(|err| err.with_component(self.name()))
    }

    /// Forget the caught error and render the children again.
    pub(crate) fn reset_boundary(&self) {
        if self.0.caught.borrow_mut().take().is_some() {
            self.schedule_update();
        }
    }

    /// Route a failed scheduled update to the nearest boundary above. With
    /// no boundary the error is reported and this instance's output is
    /// removed.
    fn route_error(&self, err: Error) -> Result<()> {
        let mut err = err;
        let mut current = self.parent();
        while let Some(ancestor) = current {
            if ancestor.catches(&err) {
                if let Some(parent) = ancestor.0.anchor.parent() {
                    return ancestor
                        .catch(err, &parent)
                        .or_else(|err| ancestor.route_error(err));
                }
            }
            err = err.with_component(ancestor.name());
            current = ancestor.parent();
        }

        self.0.host.report_error(&err, Some(self));
        let output = self.0.rendered.borrow_mut().take();
        if let Some(output) = output {
            output.unmount(&self.child_cx(), true);
        }
        Err(err)
    }

    // =========================================================================
    // UNMOUNT
    // =========================================================================

    /// Dispose the render effect, run hook cleanups, unmount children and
    /// remove the DOM.
    pub(crate) fn unmount(&self, detach: bool) {
        if !self.is_live() {
            return;
        }
        let _span = tracing::debug_span!("unmount", component = %self.name(), id = self.id()).entered();
        self.emit(LifecycleEvent::ComponentBeforeUnmount);
        self.discard(detach);
        self.emit(LifecycleEvent::ComponentUnmounted);
    }

    fn discard(&self, detach: bool) {
        self.0.state.set(InstanceState::Unmounted);
        if let Some(effect) = self.0.render_effect.take() {
            effect.dispose();
        }
        self.0.hooks.teardown();

        let output = self.0.rendered.borrow_mut().take();
        if let Some(output) = output {
            output.unmount(&self.child_cx(), detach);
        }
        if detach {
            self.0.anchor.remove();
        }

        self.0.props.dispose();
        self.0.output.borrow_mut().take();
        self.0.contexts.borrow_mut().clear();
        self.0.caught.borrow_mut().take();
    }
}

impl UpdateTarget for InstanceInner {
    fn update_key(&self) -> u64 {
        self.id
    }

    fn should_update(&self) -> bool {
        self.state.get() == InstanceState::Mounted && self.dirty.get()
    }

    fn perform_update(self: Rc<Self>) -> Result<()> {
        Instance(self).update()
    }

    fn label(&self) -> String {
        format!("<{}>#{}", self.component.name(), self.id)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id())
            .field("component", &self.name())
            .field("state", &self.state())
            .finish()
    }
}
