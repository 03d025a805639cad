//! Resources and suspend tokens.
//!
//! A [`Resource`] is a value that arrives later. Reading it inside render
//! either yields the value, fails with the load error, or fails with
//! [`Error::Pending`] carrying a [`SuspendToken`]. A Suspense boundary
//! catches the pending error and re-renders once the token resolves.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::runtime::try_with_runtime;
use super::signal::Signal;
use crate::error::{Error, Result};

/// Counter for generating unique token ids.
static TOKEN_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

struct TokenInner {
    id: u64,
    resolved: Cell<bool>,
    waiters: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// Handle to a pending load. Resolves exactly once.
#[derive(Clone)]
pub struct SuspendToken(Rc<TokenInner>);

impl SuspendToken {
    /// Create an unresolved token.
    pub fn new() -> Self {
        Self(Rc::new(TokenInner {
            id: TOKEN_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            resolved: Cell::new(false),
            waiters: RefCell::new(Vec::new()),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn is_resolved(&self) -> bool {
        self.0.resolved.get()
    }

    /// Run `f` when the token resolves, or now if it already has.
    pub fn on_resolve(&self, f: impl FnOnce() + 'static) {
        if self.is_resolved() {
            f();
        } else {
            self.0.waiters.borrow_mut().push(Box::new(f));
        }
    }

    /// Mark the token resolved and wake every waiter once.
    pub fn resolve(&self) {
        if self.0.resolved.replace(true) {
            return;
        }
        let waiters = std::mem::take(&mut *self.0.waiters.borrow_mut());
        for waiter in waiters {
            waiter();
        }
    }
}

impl Default for SuspendToken {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for SuspendToken {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SuspendToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspendToken")
            .field("id", &self.0.id)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

struct ResourceInner<T> {
    value: RefCell<Option<std::result::Result<T, String>>>,
    token: RefCell<SuspendToken>,
    version: Signal<u64>,
}

impl<T> Drop for ResourceInner<T> {
    fn drop(&mut self) {
        let id = self.version.id();
        try_with_runtime(|rt| match rt.signals.try_borrow_mut() {
            Ok(mut signals) => {
                signals.remove(id);
            }
            Err(_) => tracing::warn!(?id, "resource dropped while the signal arena is borrowed"),
        });
    }
}

/// A signal-backed value that is loaded asynchronously.
pub struct Resource<T>(Rc<ResourceInner<T>>);

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Clone + 'static> Resource<T> {
    /// Create an unloaded resource.
    pub fn new() -> Self {
        Self(Rc::new(ResourceInner {
            value: RefCell::new(None),
            token: RefCell::new(SuspendToken::new()),
            version: Signal::new(0),
        }))
    }

    /// Create a resource that is already loaded.
    pub fn ready(value: T) -> Self {
        let resource = Self::new();
        *resource.0.value.borrow_mut() = Some(Ok(value));
        resource.0.token.borrow().resolve();
        resource
    }

    /// Create a resource fed by a future on the current `LocalSet`.
    ///
    /// Must be called from within a `tokio::task::LocalSet`.
    pub fn spawn_local<F>(future: F) -> Self
    where
        F: Future<Output = std::result::Result<T, String>> + 'static,
    {
        let resource = Self::new();
        let target = resource.clone();
        tokio::task::spawn_local(async move {
            match future.await {
                Ok(value) => target.resolve(value),
                Err(message) => target.reject(message),
            }
        });
        resource
    }

    /// Read the value, subscribing the running observer to reloads.
    pub fn read(&self) -> Result<T> {
        self.0.version.try_get()?;
        match &*self.0.value.borrow() {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(Error::render(message.clone())),
            None => Err(Error::Pending(self.0.token.borrow().clone())),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.0.value.borrow().is_none()
    }

    /// Store the loaded value and wake suspended readers.
    pub fn resolve(&self, value: T) {
        *self.0.value.borrow_mut() = Some(Ok(value));
        self.settle();
    }

    /// Store a load failure; readers get a render error.
    pub fn reject(&self, message: impl Into<String>) {
        *self.0.value.borrow_mut() = Some(Err(message.into()));
        self.settle();
    }

    /// Forget the current value and start pending again.
    pub fn reload(&self) {
        *self.0.value.borrow_mut() = None;
        *self.0.token.borrow_mut() = SuspendToken::new();
        self.bump();
    }

    fn settle(&self) {
        let token = self.0.token.borrow().clone();
        self.bump();
        token.resolve();
    }

    fn bump(&self) {
        if let Err(err) = self.0.version.try_update(|v| v + 1) {
            tracing::warn!(%err, "resource update failed");
        }
    }
}

impl<T: Clone + 'static> Default for Resource<T> {
    fn default() -> Self {
        Self::new()
    }
}
