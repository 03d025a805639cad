//! Update Scheduler
//!
//! The scheduler coalesces component-level updates into flushes driven by a
//! [`Ticker`].
//!
//! # How Flushing Works
//!
//! 1. `schedule_update` enqueues a target unless it is already queued, and
//!    requests a single tick from the ticker.
//! 2. When the tick fires, the flush takes a snapshot of the queue. Targets
//!    enqueued while the snapshot is processed land in the next flush.
//! 3. Each target in the snapshot is updated in enqueue order. Targets that
//!    are gone or no longer need an update are skipped. A failed update is
//!    logged and the flush moves on to the next target.
//! 4. Post-commit callbacks run, then next-tick waiters are released.
//!
//! The first error of a flush is returned once the flush has finished.

mod ticker;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::reactive::{batch, untrack};

pub use ticker::{
    select_ticker, IdleTicker, ManualTicker, MicrotaskTicker, TickCallback, Ticker,
    TimeoutTicker,
};

/// Something the scheduler can update, such as a component instance.
pub trait UpdateTarget {
    /// Stable identity used to dedupe the queue.
    fn update_key(&self) -> u64;

    /// Whether the target still wants to run when its turn comes.
    fn should_update(&self) -> bool;

    /// Perform the update.
    fn perform_update(self: Rc<Self>) -> Result<()>;

    /// Label for log output.
    fn label(&self) -> String;
}

struct PostCommit {
    alive: Option<Box<dyn Fn() -> bool>>,
    run: Box<dyn FnOnce()>,
}

struct SchedulerInner {
    ticker: RefCell<Rc<dyn Ticker>>,
    queue: RefCell<IndexMap<u64, Weak<dyn UpdateTarget>>>,
    post_commit: RefCell<Vec<PostCommit>>,
    next_tick: RefCell<Vec<Box<dyn FnOnce()>>>,
    waiters: RefCell<Vec<oneshot::Sender<()>>>,
    tick_pending: Cell<bool>,
    flushing: Cell<bool>,
    flush_count: Cell<u64>,
}

/// Clears the flushing flag when the flush ends, including by unwinding.
struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Queue of pending component updates.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Scheduler(Rc<SchedulerInner>);

impl Scheduler {
    /// Create a scheduler driven by `ticker`.
    pub fn new(ticker: Rc<dyn Ticker>) -> Self {
        Self(Rc::new(SchedulerInner {
            ticker: RefCell::new(ticker),
            queue: RefCell::new(IndexMap::new()),
            post_commit: RefCell::new(Vec::new()),
            next_tick: RefCell::new(Vec::new()),
            waiters: RefCell::new(Vec::new()),
            tick_pending: Cell::new(false),
            flushing: Cell::new(false),
            flush_count: Cell::new(0),
        }))
    }

    /// Create a scheduler that only flushes when asked to.
    pub fn manual() -> (Self, ManualTicker) {
        let ticker = ManualTicker::new();
        (Self::new(Rc::new(ticker.clone())), ticker)
    }

    /// Replace the tick source. A tick already requested still fires.
    pub fn set_ticker(&self, ticker: Rc<dyn Ticker>) {
        *self.0.ticker.borrow_mut() = ticker;
    }

    /// Enqueue `target` unless it is already queued.
    pub fn schedule_update(&self, target: Rc<dyn UpdateTarget>) {
        let key = target.update_key();
        {
            let mut queue = self.0.queue.borrow_mut();
            if queue.contains_key(&key) {
                return;
            }
            queue.insert(key, Rc::downgrade(&target));
        }
        tracing::trace!(target = %target.label(), "update scheduled");
        self.request_tick();
    }

    /// Number of targets waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.0.queue.borrow().len()
    }

    pub fn is_queued(&self, key: u64) -> bool {
        self.0.queue.borrow().contains_key(&key)
    }

    pub fn is_flushing(&self) -> bool {
        self.0.flushing.get()
    }

    /// Number of completed flushes.
    pub fn flush_count(&self) -> u64 {
        self.0.flush_count.get()
    }

    /// Run `f` in a batch, then drain the queue before returning.
    ///
    /// Inside a running flush the queue is left to the outer flush.
    pub fn flush_sync<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let out = batch(f)?;
        if !self.is_flushing() {
            self.flush()?;
        }
        Ok(out)
    }

    /// Call `f` after the next flush.
    pub fn next_tick(&self, f: impl FnOnce() + 'static) {
        self.0.next_tick.borrow_mut().push(Box::new(f));
        self.request_tick();
    }

    /// Resolves after the next flush.
    pub fn tick(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.0.waiters.borrow_mut().push(tx);
        self.request_tick();
        rx
    }

    /// Call `f` after the next DOM mutation pass.
    pub fn schedule_post_commit(&self, f: impl FnOnce() + 'static) {
        self.0.post_commit.borrow_mut().push(PostCommit {
            alive: None,
            run: Box::new(f),
        });
    }

    /// Like [`Scheduler::schedule_post_commit`], but `f` is dropped if
    /// `alive` reports false when the commit pass ends.
    pub fn schedule_post_commit_for(
        &self,
        alive: impl Fn() -> bool + 'static,
        f: impl FnOnce() + 'static,
    ) {
        self.0.post_commit.borrow_mut().push(PostCommit {
            alive: Some(Box::new(alive)),
            run: Box::new(f),
        });
    }

    /// Process one snapshot of the queue, then run post-commit callbacks
    /// and release next-tick waiters.
    pub fn flush(&self) -> Result<()> {
        if self.0.flushing.replace(true) {
            return Ok(());
        }
        let flushing = FlushGuard(&self.0.flushing);
        self.0.tick_pending.set(false);

        let snapshot: Vec<_> = self.0.queue.borrow_mut().drain(..).collect();
        let _span = tracing::debug_span!("scheduler_flush", queued = snapshot.len()).entered();

        let mut first_error = None;
        for (_, target) in snapshot {
            let Some(target) = target.upgrade() else {
                continue;
            };
            if !target.should_update() {
                tracing::trace!(target = %target.label(), "skipped");
                continue;
            }
            let label = target.label();
            if let Err(err) = target.perform_update() {
                tracing::error!(target = %label, %err, "component update failed");
                first_error.get_or_insert(err);
            }
        }

        drop(flushing);
        self.run_post_commit();
        self.0.flush_count.set(self.0.flush_count.get() + 1);
        self.release_waiters();

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Run every queued post-commit callback whose owner is still alive.
    pub fn run_post_commit(&self) {
        loop {
            let callbacks = std::mem::take(&mut *self.0.post_commit.borrow_mut());
            if callbacks.is_empty() {
                return;
            }
            for callback in callbacks {
                if let Some(alive) = &callback.alive {
                    if !alive() {
                        tracing::trace!("post-commit callback dropped; owner disposed");
                        continue;
                    }
                }
                untrack(callback.run);
            }
        }
    }

    fn release_waiters(&self) {
        let callbacks = std::mem::take(&mut *self.0.next_tick.borrow_mut());
        for callback in callbacks {
            callback();
        }
        let waiters = std::mem::take(&mut *self.0.waiters.borrow_mut());
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    fn request_tick(&self) {
        if self.0.tick_pending.replace(true) {
            return;
        }
        let weak = Rc::downgrade(&self.0);
        let ticker = Rc::clone(&self.0.ticker.borrow());
        tracing::trace!(kind = ?ticker.kind(), "tick requested");
        ticker.request_tick(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Err(err) = Scheduler(inner).flush() {
                    tracing::error!(%err, "scheduled flush failed");
                }
            }
        }));
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("flushing", &self.is_flushing())
            .field("flush_count", &self.flush_count())
            .finish()
    }
}

// ---- Tests ----
