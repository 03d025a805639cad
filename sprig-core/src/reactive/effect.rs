//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless created lazily).
//!
//! 2. When any dependency changes, the effect is queued to re-run.
//!
//! 3. Before re-running, the effect runs the cleanup returned by its last
//!    run, then tracks a fresh set of dependencies during execution.
//!
//! # Triggers
//!
//! An effect may carry an `on_trigger` callback. When its dependencies
//! change, the callback is invoked instead of re-running the effect. The
//! owner then decides when to call [`Effect::run`]. Component render
//! effects use this to route updates through the scheduler.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use super::runtime::{with_runtime, Cleanup, EffectNode, TriggerFn};
use super::signal::or_panic;
use super::subscriber::{EffectId, NodeState};
use crate::error::Result;

/// Values an effect body may return.
///
/// `()` means "no cleanup"; any `FnOnce()` closure is stored and invoked
/// before the next run and on dispose.
pub trait IntoCleanup {
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl<F> IntoCleanup for F
where
    F: FnOnce() + 'static,
{
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(Box::new(self))
    }
}

/// Options for [`Effect::with_options`].
#[derive(Clone)]
pub struct EffectOptions {
    /// Run once synchronously on creation.
    pub immediate: bool,
    /// Called instead of re-running when a dependency changes.
    pub on_trigger: Option<Rc<dyn Fn()>>,
}

impl Default for EffectOptions {
    fn default() -> Self {
        Self {
            immediate: true,
            on_trigger: None,
        }
    }
}

/// A handle to a side-effecting computation that runs when dependencies
/// change.
///
/// # Example
///
/// ```rust,ignore
/// let count = signal(0);
///
/// let fx = Effect::new(move || {
///     println!("Count is: {}", count.get());
/// });
///
/// count.set(5);  // Prints: "Count is: 5"
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    id: EffectId,
}

impl Effect {
    /// Create a new effect and run it immediately to establish dependencies.
    pub fn new<F, R>(run: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: IntoCleanup,
    {
        Self::with_options(run, EffectOptions::default())
    }

    /// Create a new effect without running it.
    ///
    /// Useful for cases where you want to control when the effect first runs.
    pub fn new_lazy<F, R>(run: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: IntoCleanup,
    {
        Self::with_options(
            run,
            EffectOptions {
                immediate: false,
                on_trigger: None,
            },
        )
    }

    /// Create an effect with explicit options.
    pub fn with_options<F, R>(mut run: F, options: EffectOptions) -> Self
    where
        F: FnMut() -> R + 'static,
        R: IntoCleanup,
    {
        let body: Rc<RefCell<dyn FnMut() -> Option<Cleanup>>> =
            Rc::new(RefCell::new(move || run().into_cleanup()));
        let on_trigger: Option<TriggerFn> = options.on_trigger;

        let id = with_runtime(|rt| {
            rt.effects.borrow_mut().insert(EffectNode {
                run: body,
                cleanup: None,
                on_trigger,
                state: NodeState::Clean,
                sources: SmallVec::new(),
                runs: 0,
            })
        });
        let effect = Self { id };

        if options.immediate {
            or_panic(effect.try_run());
        }
        effect
    }

    /// Get the effect's arena id.
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Run the effect now, regardless of whether it is dirty.
    ///
    /// Does nothing if the effect has been disposed.
    pub fn run(&self) {
        or_panic(self.try_run());
    }

    /// Run the effect now, returning any error raised by a flush it caused.
    pub fn try_run(&self) -> Result<()> {
        with_runtime(|rt| {
            rt.run_effect(self.id)?;
            rt.flush_if_idle()
        })
    }

    /// Dispose of the effect.
    ///
    /// Runs the pending cleanup once; after disposal the effect never runs
    /// again. Idempotent.
    pub fn dispose(&self) {
        with_runtime(|rt| rt.dispose_effect(self.id));
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        with_runtime(|rt| !rt.effects.borrow().contains_key(self.id))
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        with_runtime(|rt| rt.effects.borrow().get(self.id).map_or(0, |node| node.runs))
    }

    /// Get the number of dependencies captured by the last run.
    pub fn dependency_count(&self) -> usize {
        with_runtime(|rt| {
            rt.effects
                .borrow()
                .get(self.id)
                .map_or(0, |node| node.sources.len())
        })
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect that runs immediately and whenever its dependencies
/// change.
pub fn effect<F, R>(run: F) -> Effect
where
    F: FnMut() -> R + 'static,
    R: IntoCleanup,
{
    Effect::new(run)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::signal;
    use std::cell::Cell;

    #[test]
    fn effect_runs_on_creation() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let fx = Effect::new(move || r.set(r.get() + 1));

        assert_eq!(runs.get(), 1);
        assert_eq!(fx.run_count(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let fx = Effect::new_lazy(move || r.set(r.get() + 1));

        assert_eq!(runs.get(), 0);
        assert_eq!(fx.run_count(), 0);

        fx.run();
        assert_eq!(runs.get(), 1);
        assert_eq!(fx.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let s = signal(0);
        let seen = Rc::new(Cell::new(-1));
        let o = seen.clone();
        let fx = effect(move || o.set(s.get()));

        assert_eq!(seen.get(), 0);
        assert_eq!(fx.dependency_count(), 1);

        s.set(42);
        assert_eq!(seen.get(), 42);
        assert_eq!(fx.run_count(), 2);
    }

    #[test]
    fn cleanup_runs_before_rerun_and_on_dispose() {
        let s = signal(0);
        let cleanups = Rc::new(Cell::new(0));
        let c = cleanups.clone();
        let fx = effect(move || {
            s.get();
            let c = c.clone();
            move || c.set(c.get() + 1)
        });

        assert_eq!(cleanups.get(), 0);
        s.set(1);
        assert_eq!(cleanups.get(), 1);
        s.set(2);
        assert_eq!(cleanups.get(), 2);

        fx.dispose();
        assert_eq!(cleanups.get(), 3);

        fx.dispose();
        s.set(3);
        assert_eq!(cleanups.get(), 3);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let s = signal(0);
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let fx = effect(move || {
            s.get();
            r.set(r.get() + 1);
        });

        fx.dispose();
        assert!(fx.is_disposed());
        s.set(1);
        fx.run();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn trigger_replaces_rerun() {
        let s = signal(0);
        let runs = Rc::new(Cell::new(0));
        let triggers = Rc::new(Cell::new(0));
        let r = runs.clone();
        let t = triggers.clone();
        let fx = Effect::with_options(
            move || {
                s.get();
                r.set(r.get() + 1);
            },
            EffectOptions {
                immediate: true,
                on_trigger: Some(Rc::new(move || t.set(t.get() + 1))),
            },
        );

        s.set(1);
        s.set(2);
        assert_eq!(runs.get(), 1);
        assert_eq!(triggers.get(), 2);

        fx.run();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn dependencies_are_rebound_each_run() {
        let flag = signal(true);
        let a = signal(1);
        let b = signal(2);
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let _fx = effect(move || {
            r.set(r.get() + 1);
            if flag.get() {
                a.get();
            } else {
                b.get();
            }
        });

        flag.set(false);
        assert_eq!(runs.get(), 2);

        a.set(10);
        assert_eq!(runs.get(), 2);
        assert_eq!(a.subscriber_count(), 0);

        b.set(20);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn effect_writing_what_it_reads_settles() {
        let n = signal(0);
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let fx = effect(move || {
            r.set(r.get() + 1);
            let value = n.get();
            if value < 3 {
                n.set(value + 1);
            }
        });

        assert_eq!(n.get_untracked(), 3);
        assert_eq!(runs.get(), 4);
        assert_eq!(fx.dependency_count(), 1);

        n.set(0);
        assert_eq!(n.get_untracked(), 3);
        assert_eq!(runs.get(), 8);
    }
}
