//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. On first access, the computed runs its function and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns the cache.
//!
//! 3. When a direct dependency changes, the computed is marked `Dirty`; when
//!    a transitive one changes, it is marked `MaybeDirty`.
//!
//! 4. On next access, a `MaybeDirty` computed first brings its computed
//!    sources up to date. It only recomputes if one of them produced a new
//!    value.
//!
//! # Cycles
//!
//! A computed that reads itself (directly or through other computeds) while
//! computing fails with [`Error::ComputedCycle`] instead of diverging.

use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::rc::Rc;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::runtime::{with_runtime, ComputedNode};
use super::signal::{erased_same_value, or_panic};
use super::subscriber::{ComputedId, NodeState, SourceId};
use crate::error::{Error, Result};

/// A read-only, lazily evaluated derived signal.
pub struct Computed<T> {
    id: ComputedId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Computed<T> {}

impl<T> PartialEq for Computed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Computed<T> {}

impl<T> Computed<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new computed with the given function.
    ///
    /// The function is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let id = with_runtime(|rt| {
            rt.computeds.borrow_mut().insert(ComputedNode {
                value: None,
                compute: Rc::new(move || Box::new(compute())),
                eq: erased_same_value::<T>,
                state: NodeState::Dirty,
                computing: false,
                sources: SmallVec::new(),
                observers: IndexSet::new(),
            })
        });
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics if the computed was disposed or a cycle is detected.
    pub fn get(&self) -> T {
        or_panic(self.try_get())
    }

    /// Get the current value, recomputing if necessary, and subscribe the
    /// running observer.
    pub fn try_get(&self) -> Result<T> {
        let value = self.try_get_untracked()?;
        ReactiveContext::track_dependency(SourceId::Computed(self.id));
        Ok(value)
    }

    /// Get the current value without subscribing the running observer.
    pub fn get_untracked(&self) -> T {
        or_panic(self.try_get_untracked())
    }

    /// Get the current value without subscribing the running observer.
    pub fn try_get_untracked(&self) -> Result<T> {
        with_runtime(|rt| {
            rt.update_computed(self.id)?;
            rt.computeds
                .borrow()
                .get(self.id)
                .and_then(|node| node.value.as_ref())
                .and_then(|value| value.downcast_ref::<T>().cloned())
                .ok_or(Error::DisposedSignal)
        })
    }

    /// Computeds cannot be assigned to.
    pub fn try_set(&self, _value: T) -> Result<()> {
        Err(Error::ComputedWrite)
    }
}

impl<T> Computed<T> {
    /// Get the computed's arena id.
    pub fn id(&self) -> ComputedId {
        self.id
    }

    /// Get the current freshness state.
    pub fn state(&self) -> Option<NodeState> {
        with_runtime(|rt| rt.computeds.borrow().get(self.id).map(|node| node.state))
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        with_runtime(|rt| {
            rt.computeds
                .borrow()
                .get(self.id)
                .is_some_and(|node| node.value.is_some())
        })
    }

    /// Get the number of observers.
    pub fn dependent_count(&self) -> usize {
        with_runtime(|rt| {
            rt.computeds
                .borrow()
                .get(self.id)
                .map_or(0, |node| node.observers.len())
        })
    }

    /// Remove the computed from the graph. Idempotent.
    pub fn dispose(&self) {
        with_runtime(|rt| rt.dispose_computed(self.id));
    }
}

impl<T> Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

/// Create a lazily evaluated derived signal.
pub fn computed<T, F>(compute: F) -> Computed<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(compute)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::signal;
    use std::cell::{Cell, RefCell};

    #[test]
    fn computed_runs_on_first_access() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let memo = computed(move || {
            c.set(c.get() + 1);
            42
        });

        assert!(!memo.has_value());
        assert_eq!(calls.get(), 0);

        assert_eq!(memo.get(), 42);
        assert_eq!(calls.get(), 1);
        assert!(memo.has_value());
    }

    #[test]
    fn computed_caches_value_when_clean() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let memo = computed(move || {
            c.set(c.get() + 1);
            42
        });

        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(calls.get(), 1);
        assert_eq!(memo.state(), Some(NodeState::Clean));
    }

    #[test]
    fn derived_parity() {
        let n = signal(3);
        let parity = computed(move || if n.get() % 2 == 0 { "even" } else { "odd" });

        assert_eq!(parity.get(), "odd");
        n.set(4);
        assert_eq!(parity.state(), Some(NodeState::Dirty));
        assert_eq!(parity.get(), "even");
    }

    #[test]
    fn chained_computeds_skip_unchanged_branches() {
        let n = signal(2);
        let tail_calls = Rc::new(Cell::new(0));
        let sign = computed(move || n.get() >= 0);
        let t = tail_calls.clone();
        let label = computed(move || {
            t.set(t.get() + 1);
            if sign.get() { "non-negative" } else { "negative" }
        });

        assert_eq!(label.get(), "non-negative");
        n.set(5);
        assert_eq!(label.state(), Some(NodeState::MaybeDirty));
        assert_eq!(label.get(), "non-negative");
        assert_eq!(tail_calls.get(), 1);

        n.set(-1);
        assert_eq!(label.get(), "negative");
        assert_eq!(tail_calls.get(), 2);
    }

    #[test]
    fn computed_write_is_rejected() {
        let memo = computed(|| 1);
        assert!(matches!(memo.try_set(2), Err(Error::ComputedWrite)));
    }

    #[test]
    fn self_read_is_reported_as_cycle() {
        let slot: Rc<RefCell<Option<Computed<bool>>>> = Rc::new(RefCell::new(None));
        let observed = Rc::new(Cell::new(false));

        let s = slot.clone();
        let o = observed.clone();
        let memo = computed(move || {
            if let Some(me) = *s.borrow() {
                o.set(matches!(me.try_get(), Err(Error::ComputedCycle)));
            }
            true
        });
        *slot.borrow_mut() = Some(memo);

        assert!(memo.get());
        assert!(observed.get());
    }

    #[test]
    fn disposed_computed_reports_disposed() {
        let memo = computed(|| 1);
        memo.dispose();
        assert!(matches!(memo.try_get(), Err(Error::DisposedSignal)));
    }
}
