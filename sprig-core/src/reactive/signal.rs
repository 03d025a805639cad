//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (computed/effect), the
//!    signal registers that context as an observer.
//!
//! 2. When a signal is written with a value that is not value-identical to
//!    the current one, its version is bumped and all observers are notified.
//!
//! 3. Notifications trigger re-execution of dependent computations.
//!
//! # Handles
//!
//! `Signal<T>` is a `Copy` handle (an arena id). The value itself lives in
//! the thread's runtime, so handles can be moved freely into closures.

use std::any::{type_name, Any};
use std::fmt::{self, Debug};
use std::marker::PhantomData;

use indexmap::IndexSet;

use super::context::ReactiveContext;
use super::runtime::{with_runtime, SignalNode};
use super::subscriber::{SignalId, SourceId};
use crate::error::{Error, Result};

/// Value-identity comparison.
///
/// Plain `PartialEq`, except that two values which are each unequal to
/// themselves (NaN) count as identical. `0.0` and `-0.0` compare equal.
#[allow(clippy::eq_op)]
pub fn same_value<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b || (a != a && b != b)
}

pub(crate) fn erased_same_value<T: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => same_value(a, b),
        _ => false,
    }
}

/// Whether `T` names a callable type (closure, fn pointer or `dyn Fn`).
fn is_callable<T>() -> bool {
    let name = type_name::<T>();
    name.contains("{{closure}}")
        || name.starts_with("fn(")
        || name.contains("dyn core::ops::function::Fn")
}

/// Unwrap a reactive result, panicking with the error's message.
pub(crate) fn or_panic<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("{err}"),
    }
}

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies observers)
/// count.set(5);
/// ```
pub struct Signal<T> {
    id: SignalId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Signal<T> {}

impl<T> PartialEq for Signal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Signal<T> {}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new signal with the given initial value.
    ///
    /// # Panics
    ///
    /// Panics with [`Error::InvalidInitial`] if `value` is a function.
    pub fn new(value: T) -> Self {
        or_panic(Self::try_new(value))
    }

    /// Create a new signal, failing if `value` is a function.
    pub fn try_new(value: T) -> Result<Self> {
        if is_callable::<T>() {
            return Err(Error::InvalidInitial);
        }
        let id = with_runtime(|rt| {
            rt.signals.borrow_mut().insert(SignalNode {
                value: Box::new(value),
                eq: erased_same_value::<T>,
                version: 0,
                observers: IndexSet::new(),
            })
        });
        Ok(Self {
            id,
            _marker: PhantomData,
        })
    }

    /// Get the current value, subscribing the running observer.
    ///
    /// # Panics
    ///
    /// Panics if the signal has been disposed.
    pub fn get(&self) -> T {
        or_panic(self.try_get())
    }

    /// Get the current value, subscribing the running observer.
    pub fn try_get(&self) -> Result<T> {
        self.try_with(T::clone)
    }

    /// Read the value by reference, subscribing the running observer.
    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let value = self.try_get_untracked()?;
        ReactiveContext::track_dependency(SourceId::Signal(self.id));
        Ok(f(&value))
    }

    /// Read the value by reference, subscribing the running observer.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        or_panic(self.try_with(f))
    }

    /// Get the current value without tracking dependencies (peek).
    ///
    /// # Panics
    ///
    /// Panics if the signal has been disposed.
    pub fn get_untracked(&self) -> T {
        or_panic(self.try_get_untracked())
    }

    /// Get the current value without tracking dependencies (peek).
    pub fn try_get_untracked(&self) -> Result<T> {
        with_runtime(|rt| {
            rt.signals
                .borrow()
                .get(self.id)
                .and_then(|node| node.value.downcast_ref::<T>().cloned())
                .ok_or(Error::DisposedSignal)
        })
    }

    /// Set a new value and notify observers.
    ///
    /// # Panics
    ///
    /// Panics if the signal has been disposed or the resulting flush
    /// diverges. Use [`Signal::try_set`] to handle those cases.
    pub fn set(&self, value: T) {
        or_panic(self.try_set(value))
    }

    /// Set a new value. Writing a value-identical value is a no-op.
    pub fn try_set(&self, value: T) -> Result<()> {
        with_runtime(|rt| {
            let changed = {
                let mut signals = rt.signals.borrow_mut();
                let node = signals.get_mut(self.id).ok_or(Error::DisposedSignal)?;
                if (node.eq)(node.value.as_ref(), &value) {
                    false
                } else {
                    node.value = Box::new(value);
                    node.version += 1;
                    true
                }
            };
            if changed {
                rt.source_changed(SourceId::Signal(self.id))
            } else {
                Ok(())
            }
        })
    }

    /// Update the value using a function of the previous value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        or_panic(self.try_update(f))
    }

    /// Update the value using a function of the previous value.
    pub fn try_update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.try_get_untracked()?;
        self.try_set(f(&current))
    }
}

impl<T> Signal<T> {
    /// Get the signal's arena id.
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// Number of times the value has changed.
    pub fn version(&self) -> Result<u64> {
        with_runtime(|rt| {
            rt.signals
                .borrow()
                .get(self.id)
                .map(|node| node.version)
                .ok_or(Error::DisposedSignal)
        })
    }

    /// Notify observers without changing the value.
    pub fn notify(&self) -> Result<()> {
        with_runtime(|rt| {
            if !rt.signals.borrow().contains_key(self.id) {
                return Err(Error::DisposedSignal);
            }
            rt.force_notify(SourceId::Signal(self.id))
        })
    }

    /// Drop the value and all observer edges. Idempotent.
    pub fn dispose(&self) {
        with_runtime(|rt| rt.dispose_signal(self.id));
    }

    /// Whether [`Signal::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        with_runtime(|rt| !rt.signals.borrow().contains_key(self.id))
    }

    /// Get the number of observers.
    pub fn subscriber_count(&self) -> usize {
        with_runtime(|rt| {
            rt.signals
                .borrow()
                .get(self.id)
                .map_or(0, |node| node.observers.len())
        })
    }
}

impl<T> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("subscriber_count", &self.subscriber_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create a signal.
///
/// # Panics
///
/// Panics with [`Error::InvalidInitial`] if `value` is a function.
pub fn signal<T: Clone + PartialEq + 'static>(value: T) -> Signal<T> {
    Signal::new(value)
}

/// Create a signal, failing with [`Error::InvalidInitial`] if `value` is a
/// function.
pub fn try_signal<T: Clone + PartialEq + 'static>(value: T) -> Result<Signal<T>> {
    Signal::try_new(value)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
