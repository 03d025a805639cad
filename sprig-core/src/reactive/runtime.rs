//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computeds,
//! and effects. It owns the three node arenas, the pending-effect queue and
//! the batch depth, and it schedules updates when signals change.
//!
//! # How It Works
//!
//! 1. When a signal is written with a different value, the runtime marks its
//!    direct observers `Dirty` and every transitive observer `MaybeDirty`.
//!
//! 2. Effects reached by that walk are queued in insertion order.
//!
//! 3. Outside a batch the queue is flushed immediately. Each queued effect
//!    first pulls its computed sources; it only reruns if one of them really
//!    produced a new value, or if it was marked `Dirty` directly.
//!
//! 4. Computeds are lazy: they recompute on the next read, never on write.
//!
//! # Threading
//!
//! The runtime is thread-local. Every signal handle is tied to the thread
//! that created it, matching the single-threaded host event loop.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexSet;
use slotmap::SlotMap;

use super::context::{Dependencies, ReactiveContext};
use super::subscriber::{ComputedId, EffectId, NodeState, ObserverId, SignalId, SourceId};
use crate::error::{Error, Result};

/// Default number of times one effect may run within a single flush.
pub const DEFAULT_REENTRY_LIMIT: u32 = 100;

/// A cleanup callback returned by an effect.
pub type Cleanup = Box<dyn FnOnce()>;

pub(crate) type ComputeFn = Rc<dyn Fn() -> Box<dyn Any>>;
pub(crate) type EqFn = fn(&dyn Any, &dyn Any) -> bool;
pub(crate) type RunFn = Rc<RefCell<dyn FnMut() -> Option<Cleanup>>>;
pub(crate) type TriggerFn = Rc<dyn Fn()>;

pub(crate) struct SignalNode {
    pub(crate) value: Box<dyn Any>,
    pub(crate) eq: EqFn,
    pub(crate) version: u64,
    pub(crate) observers: IndexSet<ObserverId>,
}

pub(crate) struct ComputedNode {
    pub(crate) value: Option<Box<dyn Any>>,
    pub(crate) compute: ComputeFn,
    pub(crate) eq: EqFn,
    pub(crate) state: NodeState,
    pub(crate) computing: bool,
    pub(crate) sources: Dependencies,
    pub(crate) observers: IndexSet<ObserverId>,
}

pub(crate) struct EffectNode {
    pub(crate) run: RunFn,
    pub(crate) cleanup: Option<Cleanup>,
    pub(crate) on_trigger: Option<TriggerFn>,
    pub(crate) state: NodeState,
    pub(crate) sources: Dependencies,
    pub(crate) runs: usize,
}

/// Counts of live nodes, for diagnostics and leak checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactiveStats {
    pub signal_count: usize,
    pub computed_count: usize,
    pub effect_count: usize,
    pub pending_effects: usize,
}

/// The per-thread reactive runtime.
pub(crate) struct Runtime {
    pub(crate) signals: RefCell<SlotMap<SignalId, SignalNode>>,
    pub(crate) computeds: RefCell<SlotMap<ComputedId, ComputedNode>>,
    pub(crate) effects: RefCell<SlotMap<EffectId, EffectNode>>,
    pending: RefCell<IndexSet<EffectId>>,
    batch_depth: Cell<u32>,
    flushing: Cell<bool>,
    reentry_limit: Cell<u32>,
}

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

/// Run `f` with this thread's runtime.
pub(crate) fn with_runtime<R>(f: impl FnOnce(&Runtime) -> R) -> R {
    RUNTIME.with(f)
}

/// Like [`with_runtime`], but returns `None` once the thread's runtime has
/// been torn down.
pub(crate) fn try_with_runtime<R>(f: impl FnOnce(&Runtime) -> R) -> Option<R> {
    RUNTIME.try_with(f).ok()
}

/// Snapshot the number of live reactive nodes on this thread.
pub fn stats() -> ReactiveStats {
    with_runtime(|rt| ReactiveStats {
        signal_count: rt.signals.borrow().len(),
        computed_count: rt.computeds.borrow().len(),
        effect_count: rt.effects.borrow().len(),
        pending_effects: rt.pending.borrow().len(),
    })
}

/// Set how many times a single effect may run within one flush before the
/// flush fails with [`Error::BatchDivergence`].
pub fn set_reentry_limit(limit: u32) {
    with_runtime(|rt| rt.reentry_limit.set(limit.max(1)));
}

/// The current re-entry limit.
pub fn reentry_limit() -> u32 {
    with_runtime(|rt| rt.reentry_limit.get())
}

impl Runtime {
    fn new() -> Self {
        Self {
            signals: RefCell::new(SlotMap::with_key()),
            computeds: RefCell::new(SlotMap::with_key()),
            effects: RefCell::new(SlotMap::with_key()),
            pending: RefCell::new(IndexSet::new()),
            batch_depth: Cell::new(0),
            flushing: Cell::new(false),
            reentry_limit: Cell::new(DEFAULT_REENTRY_LIMIT),
        }
    }

    // =========================================================================
    // PROPAGATION
    // =========================================================================

    /// A source changed value: mark its observers and flush if allowed.
    pub(crate) fn source_changed(&self, source: SourceId) -> Result<()> {
        let observers: Vec<ObserverId> = match source {
            SourceId::Signal(id) => self
                .signals
                .borrow()
                .get(id)
                .map(|node| node.observers.iter().copied().collect())
                .unwrap_or_default(),
            SourceId::Computed(id) => self
                .computeds
                .borrow()
                .get(id)
                .map(|node| node.observers.iter().copied().collect())
                .unwrap_or_default(),
        };

        for observer in observers {
            self.mark(observer, NodeState::Dirty);
        }

        self.flush_if_idle()
    }

    /// Raise an observer's state, propagating `MaybeDirty` downstream the
    /// first time a computed leaves `Clean`.
    fn mark(&self, observer: ObserverId, state: NodeState) {
        match observer {
            ObserverId::Computed(id) => {
                let downstream: Vec<ObserverId> = {
                    let mut computeds = self.computeds.borrow_mut();
                    let Some(node) = computeds.get_mut(id) else {
                        return;
                    };
                    if node.state >= state {
                        return;
                    }
                    let was = node.state;
                    node.state = state;
                    if was != NodeState::Clean {
                        return;
                    }
                    node.observers.iter().copied().collect()
                };
                for next in downstream {
                    self.mark(next, NodeState::MaybeDirty);
                }
            }
            ObserverId::Effect(id) => {
                let enqueue = {
                    let mut effects = self.effects.borrow_mut();
                    let Some(node) = effects.get_mut(id) else {
                        return;
                    };
                    let was = node.state;
                    if node.state < state {
                        node.state = state;
                    }
                    was == NodeState::Clean
                };
                if enqueue {
                    tracing::trace!(?id, "effect queued");
                    self.pending.borrow_mut().insert(id);
                }
            }
        }
    }

    /// Force every observer of a source to be treated as dirty, even though
    /// the source value did not change.
    pub(crate) fn force_notify(&self, source: SourceId) -> Result<()> {
        self.source_changed(source)
    }

    // =========================================================================
    // COMPUTEDS
    // =========================================================================

    /// Bring a computed up to date, recomputing only if a dependency really
    /// changed.
    pub(crate) fn update_computed(&self, id: ComputedId) -> Result<()> {
        let (state, sources) = {
            let computeds = self.computeds.borrow();
            let node = computeds.get(id).ok_or(Error::DisposedSignal)?;
            if node.computing {
                return Err(Error::ComputedCycle);
            }
            (node.state, node.sources.clone())
        };

        if state == NodeState::MaybeDirty {
            for source in sources {
                if let SourceId::Computed(upstream) = source {
                    self.update_computed(upstream)?;
                    if self.computed_state(id) == Some(NodeState::Dirty) {
                        break;
                    }
                }
            }
        }

        if self.computed_state(id) == Some(NodeState::Dirty) {
            self.recompute(id)?;
        }

        if let Some(node) = self.computeds.borrow_mut().get_mut(id) {
            node.state = NodeState::Clean;
        }
        Ok(())
    }

    fn computed_state(&self, id: ComputedId) -> Option<NodeState> {
        self.computeds.borrow().get(id).map(|node| node.state)
    }

    fn recompute(&self, id: ComputedId) -> Result<()> {
        let compute = {
            let mut computeds = self.computeds.borrow_mut();
            let node = computeds.get_mut(id).ok_or(Error::DisposedSignal)?;
            node.computing = true;
            Rc::clone(&node.compute)
        };

        let computing = ComputingGuard { rt: self, id };
        let ctx = ReactiveContext::enter(ObserverId::Computed(id));
        let new_value = compute();
        let dependencies = ctx.finish();
        drop(computing);

        let old_sources = {
            let mut computeds = self.computeds.borrow_mut();
            let Some(node) = computeds.get_mut(id) else {
                return Ok(());
            };
            std::mem::replace(&mut node.sources, dependencies.clone())
        };
        self.rebind(ObserverId::Computed(id), &old_sources, &dependencies);

        let changed_observers: Vec<ObserverId> = {
            let mut computeds = self.computeds.borrow_mut();
            let Some(node) = computeds.get_mut(id) else {
                return Ok(());
            };
            let changed = match &node.value {
                Some(old) => !(node.eq)(old.as_ref(), new_value.as_ref()),
                None => true,
            };
            node.value = Some(new_value);
            if changed {
                node.observers.iter().copied().collect()
            } else {
                Vec::new()
            }
        };

        for observer in changed_observers {
            match observer {
                ObserverId::Computed(downstream) => {
                    if let Some(node) = self.computeds.borrow_mut().get_mut(downstream) {
                        node.state = NodeState::Dirty;
                    }
                }
                ObserverId::Effect(effect) => {
                    let enqueue = {
                        let mut effects = self.effects.borrow_mut();
                        match effects.get_mut(effect) {
                            Some(node) => {
                                let was = node.state;
                                node.state = NodeState::Dirty;
                                was == NodeState::Clean
                            }
                            None => false,
                        }
                    };
                    if enqueue {
                        self.pending.borrow_mut().insert(effect);
                    }
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // EFFECTS
    // =========================================================================

    /// Run an effect now, rebinding its dependencies.
    pub(crate) fn run_effect(&self, id: EffectId) -> Result<()> {
        let (run, cleanup) = {
            let mut effects = self.effects.borrow_mut();
            let node = match effects.get_mut(id) {
                Some(node) => node,
                None => return Ok(()),
            };
            node.state = NodeState::Clean;
            (Rc::clone(&node.run), node.cleanup.take())
        };

        if let Some(cleanup) = cleanup {
            let _untracked = ReactiveContext::untracked();
            cleanup();
        }

        let Ok(mut body) = run.try_borrow_mut() else {
            tracing::warn!(?id, "effect re-entered while running; skipped");
            return Ok(());
        };

        // Writes made by the body are queued and flushed once it returns, so
        // an effect that writes a source it read runs again.
        let scope = BatchScope::enter(self);
        let ctx = ReactiveContext::enter(ObserverId::Effect(id));
        let cleanup = (&mut *body)();
        let dependencies = ctx.finish();
        drop(body);

        let old_sources = {
            let mut effects = self.effects.borrow_mut();
            match effects.get_mut(id) {
                Some(node) => {
                    node.runs += 1;
                    node.cleanup = cleanup;
                    Some(std::mem::replace(&mut node.sources, dependencies.clone()))
                }
                None => {
                    // Disposed during its own run.
                    if let Some(cleanup) = cleanup {
                        cleanup();
                    }
                    None
                }
            }
        };

        if let Some(old_sources) = old_sources {
            self.rebind(ObserverId::Effect(id), &old_sources, &dependencies);
        }
        scope.exit()
    }

    /// Decide whether a queued effect must run, then run or trigger it.
    fn process_effect(&self, id: EffectId) -> Result<()> {
        let (state, sources) = match self.effects.borrow().get(id) {
            Some(node) => (node.state, node.sources.clone()),
            None => return Ok(()),
        };

        if state == NodeState::MaybeDirty {
            for source in sources {
                if let SourceId::Computed(upstream) = source {
                    self.update_computed(upstream)?;
                    if self.effect_state(id) == Some(NodeState::Dirty) {
                        break;
                    }
                }
            }
        }

        let trigger = {
            let mut effects = self.effects.borrow_mut();
            let Some(node) = effects.get_mut(id) else {
                return Ok(());
            };
            if node.state != NodeState::Dirty {
                node.state = NodeState::Clean;
                return Ok(());
            }
            match &node.on_trigger {
                Some(trigger) => {
                    node.state = NodeState::Clean;
                    Some(Rc::clone(trigger))
                }
                None => None,
            }
        };

        match trigger {
            Some(trigger) => {
                trigger();
                Ok(())
            }
            None => self.run_effect(id),
        }
    }

    fn effect_state(&self, id: EffectId) -> Option<NodeState> {
        self.effects.borrow().get(id).map(|node| node.state)
    }

    /// Remove an effect from the graph, running its pending cleanup.
    pub(crate) fn dispose_effect(&self, id: EffectId) {
        let Some(node) = self.effects.borrow_mut().remove(id) else {
            return;
        };
        self.pending.borrow_mut().shift_remove(&id);
        self.rebind(ObserverId::Effect(id), &node.sources, &Dependencies::new());
        if let Some(cleanup) = node.cleanup {
            let _untracked = ReactiveContext::untracked();
            cleanup();
        }
    }

    /// Remove a computed from the graph.
    pub(crate) fn dispose_computed(&self, id: ComputedId) {
        let Some(node) = self.computeds.borrow_mut().remove(id) else {
            return;
        };
        self.rebind(ObserverId::Computed(id), &node.sources, &Dependencies::new());
    }

    /// Remove a signal; its observers simply lose the edge.
    pub(crate) fn dispose_signal(&self, id: SignalId) {
        self.signals.borrow_mut().remove(id);
    }

    /// Subscribe an effect to a source as soon as it is read, so a write
    /// later in the same run marks it.
    pub(crate) fn subscribe(&self, observer: ObserverId, source: SourceId) {
        match source {
            SourceId::Signal(id) => {
                if let Some(node) = self.signals.borrow_mut().get_mut(id) {
                    node.observers.insert(observer);
                }
            }
            SourceId::Computed(id) => {
                if let Some(node) = self.computeds.borrow_mut().get_mut(id) {
                    node.observers.insert(observer);
                }
            }
        }
    }

    /// Replace an observer's source edges.
    fn rebind(&self, observer: ObserverId, old: &[SourceId], new: &[SourceId]) {
        for source in old.iter().filter(|source| !new.contains(source)) {
            match source {
                SourceId::Signal(id) => {
                    if let Some(node) = self.signals.borrow_mut().get_mut(*id) {
                        node.observers.shift_remove(&observer);
                    }
                }
                SourceId::Computed(id) => {
                    if let Some(node) = self.computeds.borrow_mut().get_mut(*id) {
                        node.observers.shift_remove(&observer);
                    }
                }
            }
        }
        for source in new {
            match source {
                SourceId::Signal(id) => {
                    if let Some(node) = self.signals.borrow_mut().get_mut(*id) {
                        node.observers.insert(observer);
                    }
                }
                SourceId::Computed(id) => {
                    if let Some(node) = self.computeds.borrow_mut().get_mut(*id) {
                        node.observers.insert(observer);
                    }
                }
            }
        }
    }

    // =========================================================================
    // BATCHING
    // =========================================================================

    pub(crate) fn enter_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    /// Leave a batch; returns true when this was the outermost one.
    pub(crate) fn exit_batch(&self) -> bool {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        depth == 0
    }

    pub(crate) fn flush_if_idle(&self) -> Result<()> {
        if self.batch_depth.get() == 0 {
            self.flush()
        } else {
            Ok(())
        }
    }

    /// Run queued effects in insertion order until the queue is empty.
    ///
    /// Effects enqueued during the flush are appended and run in the same
    /// flush. A single effect may run at most `reentry_limit` times.
    pub(crate) fn flush(&self) -> Result<()> {
        if self.flushing.replace(true) {
            return Ok(());
        }
        let flushing = FlagGuard(&self.flushing);

        let limit = self.reentry_limit.get();
        let mut runs: HashMap<EffectId, u32> = HashMap::new();
        let mut iterations = 0usize;

        let result = loop {
            let next = self.pending.borrow_mut().shift_remove_index(0);
            let Some(id) = next else {
                break Ok(());
            };

            let count = runs.entry(id).or_insert(0);
            *count += 1;
            if *count > limit {
                self.abandon_pending(id);
                tracing::error!(?id, limit, "effect flush diverged");
                break Err(Error::BatchDivergence { limit });
            }

            iterations += 1;
            if let Err(err) = self.process_effect(id) {
                self.abandon_pending(id);
                break Err(err);
            }
        };

        tracing::trace!(iterations, "flush complete");
        drop(flushing);
        result
    }

    /// Drop every queued effect after a failed flush, resetting their state
    /// so later writes can queue them again.
    fn abandon_pending(&self, current: EffectId) {
        let dropped: Vec<EffectId> = self.pending.borrow_mut().drain(..).collect();
        let mut effects = self.effects.borrow_mut();
        for id in dropped.into_iter().chain(std::iter::once(current)) {
            if let Some(node) = effects.get_mut(id) {
                node.state = NodeState::Clean;
            }
        }
    }
}

/// Resets a flag when dropped, including while unwinding.
struct FlagGuard<'a>(&'a Cell<bool>);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Clears a computed's `computing` mark when its compute function returns
/// or unwinds.
struct ComputingGuard<'a> {
    rt: &'a Runtime,
    id: ComputedId,
}

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut computeds) = self.rt.computeds.try_borrow_mut() {
            if let Some(node) = computeds.get_mut(self.id) {
                node.computing = false;
            }
        }
    }
}

/// A batch held open by the runtime itself. `exit` flushes when it was the
/// outermost batch; unwinding only restores the depth.
struct BatchScope<'a> {
    rt: &'a Runtime,
    armed: bool,
}

impl<'a> BatchScope<'a> {
    fn enter(rt: &'a Runtime) -> Self {
        rt.enter_batch();
        Self { rt, armed: true }
    }

    fn exit(mut self) -> Result<()> {
        self.armed = false;
        if self.rt.exit_batch() {
            self.rt.flush()
        } else {
            Ok(())
        }
    }
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.rt.exit_batch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{batch, computed, effect, signal};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn stats_track_live_nodes() {
        let before = stats();
        let a = signal(1);
        let doubled = computed(move || a.get() * 2);
        let fx = effect(move || {
            doubled.get();
        });

        let during = stats();
        assert_eq!(during.signal_count, before.signal_count + 1);
        assert_eq!(during.computed_count, before.computed_count + 1);
        assert_eq!(during.effect_count, before.effect_count + 1);

        fx.dispose();
        doubled.dispose();
        a.dispose();
        assert_eq!(stats(), before);
    }

    #[test]
    fn divergent_effect_fails_batch() {
        set_reentry_limit(5);
        let n = signal(0);
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let fx = effect(move || {
            r.set(r.get() + 1);
            let value = n.get();
            if value >= 100 {
                let _ = n.try_set(value + 1);
            }
        });

        let result = batch(|| n.set(100));
        assert!(matches!(result, Err(Error::BatchDivergence { limit: 5 })));
        assert!(runs.get() <= 1 + 5 + 1);
        fx.dispose();
        set_reentry_limit(DEFAULT_REENTRY_LIMIT);
    }

    #[test]
    fn unchanged_computed_does_not_rerun_effect() {
        let n = signal(1);
        let positive = computed(move || n.get() > 0);
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let _fx = effect(move || {
            positive.get();
            r.set(r.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        n.set(2);
        assert_eq!(runs.get(), 1);

        n.set(-1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn panicking_effect_leaves_runtime_usable() {
        let a = signal(0);
        let b = signal(0);
        let _bad = effect(move || {
            if a.get() > 0 {
                panic!("effect panicked");
            }
        });
        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        let _watch = effect(move || s.set(b.get()));

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| a.set(1)));
        assert!(outcome.is_err());

        b.set(7);
        assert_eq!(seen.get(), 7);
        assert_eq!(stats().pending_effects, 0);
    }

    #[test]
    fn panicking_computed_is_not_a_cycle_afterwards() {
        let fail = signal(true);
        let value = computed(move || {
            if fail.get() {
                panic!("compute panicked");
            }
            1
        });

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| value.get()));
        assert!(outcome.is_err());

        fail.set(false);
        assert_eq!(value.try_get().unwrap(), 1);
    }
}
