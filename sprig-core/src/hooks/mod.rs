//! Hooks Runtime
//!
//! Hooks give component render functions per-instance state. They are
//! positional: the n-th hook call of a render always reads the n-th slot of
//! the instance, so calls must happen in the same order on every render.
//!
//! # How Hooks Work
//!
//! 1. Before a render, the instance resets its hook cursor and hands the
//!    render function a [`Scope`].
//! 2. Each `use_*` call on the scope claims the next slot, creating it on
//!    the first render and reusing it afterwards.
//! 3. After the render, the number of claimed slots is checked against
//!    previous renders (in dev mode).
//! 4. On unmount, every slot teardown runs in reverse order: effect
//!    cleanups run and hook-owned signals are disposed.
//!
//! # Example
//!
//! ```rust,ignore
//! let counter = define_component("Counter", |cx, _props| {
//!     let (count, set_count) = cx.use_state(0)?;
//!     cx.use_effect(move || tracing::info!(count, "rendered"), Some(count))?;
//!     Ok(h(
//!         "button",
//!         props! { "onClick" => PropValue::handler(move |_| set_count.update(|c| c + 1)) },
//!         children![count],
//!     ))
//! });
//! ```

mod context;
mod state;

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::component::{Instance, WeakInstance};
use crate::error::{Error, Result};
use crate::reactive::{untrack, Computed, IntoCleanup, Signal};
use crate::scheduler::Scheduler;

pub use context::{create_context, Context};
pub(crate) use state::{HookState, SlotTeardown};

/// A stable mutable box returned by [`Scope::use_ref`].
///
/// Writing `current` never triggers a render.
pub struct MutableRef<T>(Rc<RefCell<T>>);

impl<T> MutableRef<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn set_current(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone> MutableRef<T> {
    pub fn current(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T> Clone for MutableRef<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for MutableRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutableRef").field(&self.0.borrow()).finish()
    }
}

/// Setter returned by [`Scope::use_state`].
pub struct SetState<T> {
    signal: Signal<T>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SetState<T> {}

impl<T: Clone + PartialEq + 'static> SetState<T> {
    /// Write a new value; the owning component re-renders if it changed.
    ///
    /// # Panics
    ///
    /// Panics if the component has been unmounted.
    pub fn set(&self, value: T) {
        self.signal.set(value);
    }

    /// Write a value computed from the previous one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        self.signal.update(f);
    }

    pub fn try_set(&self, value: T) -> Result<()> {
        self.signal.try_set(value)
    }

    pub fn try_update(&self, f: impl FnOnce(&T) -> T) -> Result<()> {
        self.signal.try_update(f)
    }

    pub fn signal(&self) -> Signal<T> {
        self.signal
    }
}

struct EffectSlot {
    deps: Option<Box<dyn Any>>,
    initialized: bool,
    cleanup: Rc<RefCell<Option<crate::reactive::Cleanup>>>,
}

#[derive(Default)]
struct MemoSlot {
    deps: Option<Box<dyn Any>>,
    value: Option<Box<dyn Any>>,
}

/// Whether `next` differs from the stored dependency snapshot. `None` deps
/// always differ.
fn deps_changed<D: PartialEq + 'static>(prev: Option<&dyn Any>, next: Option<&D>) -> bool {
    match (prev.and_then(|p| p.downcast_ref::<D>()), next) {
        (Some(prev), Some(next)) => prev != next,
        _ => true,
    }
}

/// The render context handed to a component's render function.
///
/// Hook calls made through a scope outside of its component's render fail
/// with [`Error::HookContextMissing`].
#[derive(Clone)]
pub struct Scope {
    instance: WeakInstance,
}

impl Scope {
    pub(crate) fn new(instance: &Instance) -> Self {
        Self {
            instance: instance.downgrade(),
        }
    }

    /// The instance this scope renders, if it is still alive.
    pub fn instance(&self) -> Option<Instance> {
        self.instance.upgrade()
    }

    fn rendering(&self) -> Result<Instance> {
        match self.instance.upgrade() {
            Some(instance) if instance.hooks().is_rendering() => Ok(instance),
            _ => Err(Error::HookContextMissing),
        }
    }

    fn claim<T, R>(
        &self,
        kind: &'static str,
        init: impl FnOnce() -> Result<(T, Option<SlotTeardown>)>,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<(Instance, usize, R)>
    where
        T: 'static,
    {
        let instance = self.rendering()?;
        let strict = instance.dev_mode();
        let (index, out) = instance.hooks().next(kind, strict, init, f)?;
        Ok((instance, index, out))
    }

    /// Local state. Returns the current value and a setter; writes schedule
    /// a re-render.
    pub fn use_state<T>(&self, initial: T) -> Result<(T, SetState<T>)>
    where
        T: Clone + PartialEq + 'static,
    {
        self.use_state_with(move || initial)
    }

    /// Like [`Scope::use_state`], computing the initial value on first
    /// render only.
    pub fn use_state_with<T>(&self, initial: impl FnOnce() -> T) -> Result<(T, SetState<T>)>
    where
        T: Clone + PartialEq + 'static,
    {
        let (_, _, signal) = self.claim("state", || owned_signal(initial()), |s: &mut Signal<T>| *s)?;
        Ok((signal.try_get()?, SetState { signal }))
    }

    /// A signal owned by this instance. Reads during render subscribe it.
    pub fn use_signal<T>(&self, initial: T) -> Result<Signal<T>>
    where
        T: Clone + PartialEq + 'static,
    {
        let (_, _, signal) = self.claim("signal", move || owned_signal(initial), |s: &mut Signal<T>| *s)?;
        Ok(signal)
    }

    /// A computed owned by this instance. `compute` is captured on the first
    /// render; later renders reuse the same computed.
    pub fn use_computed<T, F>(&self, compute: F) -> Result<Computed<T>>
    where
        T: Clone + PartialEq + 'static,
        F: Fn() -> T + 'static,
    {
        let (_, _, computed) = self.claim(
            "computed",
            move || {
                let computed = Computed::new(compute);
                let teardown: SlotTeardown = Box::new(move || computed.dispose());
                Ok((computed, Some(teardown)))
            },
            |c: &mut Computed<T>| *c,
        )?;
        Ok(computed)
    }

    /// Run `effect` after the commit of this render when `deps` changed.
    ///
    /// `None` runs after every commit; `Some(())` runs once. A returned
    /// cleanup runs before the next run and on unmount.
    pub fn use_effect<F, R, D>(&self, effect: F, deps: Option<D>) -> Result<()>
    where
        F: FnOnce() -> R + 'static,
        R: IntoCleanup,
        D: PartialEq + 'static,
    {
        let (instance, _, pending) = self.claim(
            "effect",
            || {
                let cleanup = Rc::new(RefCell::new(None));
                let cell: Rc<RefCell<Option<crate::reactive::Cleanup>>> = Rc::clone(&cleanup);
                let teardown: SlotTeardown = Box::new(move || {
                    let pending = cell.borrow_mut().take();
                    if let Some(cleanup) = pending {
                        cleanup();
                    }
                });
                Ok((
                    EffectSlot {
                        deps: None,
                        initialized: false,
                        cleanup,
                    },
                    Some(teardown),
                ))
            },
            |slot: &mut EffectSlot| {
                let changed = !slot.initialized || deps_changed(slot.deps.as_deref(), deps.as_ref());
                if !changed {
                    return None;
                }
                slot.initialized = true;
                slot.deps = deps.map(|d| Box::new(d) as Box<dyn Any>);
                Some(Rc::clone(&slot.cleanup))
            },
        )?;

        let Some(cleanup) = pending else {
            return Ok(());
        };
        let owner = instance.downgrade();
        instance.scheduler().schedule_post_commit_for(
            move || owner.upgrade().is_some_and(|i| i.is_live()),
            move || {
                let previous = cleanup.borrow_mut().take();
                if let Some(previous) = previous {
                    previous();
                }
                let next = effect().into_cleanup();
                *cleanup.borrow_mut() = next;
            },
        );
        Ok(())
    }

    /// A value cached until `deps` change. `None` recomputes every render.
    pub fn use_memo<T, D>(&self, compute: impl FnOnce() -> T, deps: Option<D>) -> Result<T>
    where
        T: Clone + 'static,
        D: PartialEq + 'static,
    {
        self.memo_slot("memo", compute, deps)
    }

    /// A callback kept stable until `deps` change.
    pub fn use_callback<F, D>(&self, callback: F, deps: Option<D>) -> Result<Rc<F>>
    where
        F: 'static,
        D: PartialEq + 'static,
    {
        self.memo_slot("callback", move || Rc::new(callback), deps)
    }

    fn memo_slot<T, D>(&self, kind: &'static str, compute: impl FnOnce() -> T, deps: Option<D>) -> Result<T>
    where
        T: Clone + 'static,
        D: PartialEq + 'static,
    {
        let (instance, index, cached) = self.claim(
            kind,
            || Ok((MemoSlot::default(), None)),
            |slot: &mut MemoSlot| {
                if deps_changed(slot.deps.as_deref(), deps.as_ref()) {
                    return None;
                }
                slot.value.as_ref().and_then(|v| v.downcast_ref::<T>()).cloned()
            },
        )?;
        if let Some(value) = cached {
            return Ok(value);
        }

        let value = untrack(compute);
        let stored = value.clone();
        instance.hooks().with_slot(index, kind, move |slot: &mut MemoSlot| {
            slot.deps = deps.map(|d| Box::new(d) as Box<dyn Any>);
            slot.value = Some(Box::new(stored));
        })?;
        Ok(value)
    }

    /// A stable mutable box.
    pub fn use_ref<T: 'static>(&self, initial: T) -> Result<MutableRef<T>> {
        let (_, _, cell) = self.claim(
            "ref",
            move || Ok((MutableRef::new(initial), None)),
            |cell: &mut MutableRef<T>| cell.clone(),
        )?;
        Ok(cell)
    }

    /// The nearest value provided for `context` by an ancestor, or its
    /// default.
    pub fn use_context<T: Clone + 'static>(&self, context: &Context<T>) -> Result<T> {
        let (instance, _, ()) = self.claim("context", || Ok(((), None)), |_: &mut ()| ())?;
        let mut current = instance.parent();
        while let Some(ancestor) = current {
            if let Some(value) = ancestor.provided(context.id()) {
                if let Ok(value) = value.downcast::<T>() {
                    return Ok((*value).clone());
                }
            }
            current = ancestor.parent();
        }
        Ok(context.default_value().clone())
    }

    /// Record `value` for `context` on this instance for its descendants.
    pub fn provide<T: 'static>(&self, context: &Context<T>, value: T) -> Result<()> {
        self.provide_any(context.id(), Rc::new(value))
    }

    pub(crate) fn provide_any(&self, id: u64, value: Rc<dyn Any>) -> Result<()> {
        let instance = self.rendering()?;
        instance.provide(id, value);
        Ok(())
    }

    /// A service registered on the app (router, store, ...).
    pub fn service<T: 'static>(&self) -> Option<Rc<T>> {
        self.instance.upgrade().and_then(|i| i.service::<T>())
    }

    /// The error caught by this instance when it is an error boundary.
    pub fn caught_error(&self) -> Option<Error> {
        self.instance.upgrade().and_then(|i| i.caught_error())
    }

    /// Force a re-render of this instance in the next flush.
    pub fn schedule_update(&self) {
        if let Some(instance) = self.instance.upgrade() {
            instance.schedule_update();
        }
    }

    pub fn scheduler(&self) -> Option<Scheduler> {
        self.instance.upgrade().map(|i| i.scheduler().clone())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("instance", &self.instance.upgrade().map(|i| i.id()))
            .finish()
    }
}

fn owned_signal<T>(value: T) -> Result<(Signal<T>, Option<SlotTeardown>)>
where
    T: Clone + PartialEq + 'static,
{
    let signal = Signal::try_new(value)?;
    let teardown: SlotTeardown = Box::new(move || signal.dispose());
    Ok((signal, Some(teardown)))
}
