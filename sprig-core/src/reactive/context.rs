//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (running a computed or an effect), we
//! push the observer onto the stack. When the computation completes, we pop it.
//!
//! `untrack` pushes an entry with no observer, which hides every outer
//! observer until it is popped again.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::runtime::with_runtime;
use super::subscriber::{ObserverId, SourceId};

/// Dependencies collected by one run of an observer.
pub(crate) type Dependencies = SmallVec<[SourceId; 8]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug)]
struct ContextEntry {
    /// The observer being run, or `None` inside `untrack`.
    observer: Option<ObserverId>,
    /// Sources read during this run, deduplicated, in first-read order.
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    observer: Option<ObserverId>,
    popped: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given observer.
    ///
    /// While this context is active, sources that are read will register
    /// the observer as a dependent.
    pub(crate) fn enter(observer: ObserverId) -> Self {
        Self::push(Some(observer))
    }

    /// Enter a context in which reads are not tracked.
    pub(crate) fn untracked() -> Self {
        Self::push(None)
    }

    fn push(observer: Option<ObserverId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                observer,
                dependencies: SmallVec::new(),
            });
        });
        Self {
            observer,
            popped: false,
        }
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking() -> bool {
        Self::current_observer().is_some()
    }

    /// The observer that a read right now would subscribe, if any.
    pub(crate) fn current_observer() -> Option<ObserverId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.observer))
    }

    /// Record a dependency on the given source.
    ///
    /// Called by signals and computeds when they are read. A running effect
    /// is subscribed right away; computeds are bound when they finish.
    pub(crate) fn track_dependency(source: SourceId) {
        let added = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entry = stack.last_mut()?;
            let observer = entry.observer?;
            if entry.dependencies.contains(&source) {
                return None;
            }
            entry.dependencies.push(source);
            Some(observer)
        });
        if let Some(observer @ ObserverId::Effect(_)) = added {
            with_runtime(|rt| rt.subscribe(observer, source));
        }
    }

    /// Pop this context and return the dependencies it collected.
    pub(crate) fn finish(mut self) -> Dependencies {
        self.popped = true;
        CONTEXT_STACK.with(|stack| {
            let entry = stack.borrow_mut().pop();
            match entry {
                Some(entry) => {
                    debug_assert_eq!(
                        entry.observer, self.observer,
                        "ReactiveContext mismatch: expected {:?}, got {:?}",
                        self.observer, entry.observer
                    );
                    entry.dependencies
                }
                None => SmallVec::new(),
            }
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if self.popped {
            return;
        }
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.observer, self.observer,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.observer, entry.observer
                );
            }
        });
    }
}
