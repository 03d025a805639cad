//! Batching and untracked reads.

use super::context::ReactiveContext;
use super::runtime::with_runtime;
use crate::error::Result;

/// Leaves the batch if the batched closure unwinds.
struct BatchGuard {
    armed: bool,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if self.armed {
            with_runtime(|rt| rt.exit_batch());
        }
    }
}

/// Run `f` with notifications deferred to the end of the outermost batch.
///
/// Observers queued during the batch run once each, in the order they were
/// first queued. Errors raised by that flush (for example
/// [`Error::BatchDivergence`](crate::Error::BatchDivergence)) are returned.
pub fn batch<R>(f: impl FnOnce() -> R) -> Result<R> {
    with_runtime(|rt| rt.enter_batch());
    let mut guard = BatchGuard { armed: true };
    let value = f();
    guard.armed = false;

    let outermost = with_runtime(|rt| rt.exit_batch());
    if outermost {
        with_runtime(|rt| rt.flush())?;
    }
    Ok(value)
}

/// Run `f` without subscribing the current observer to anything it reads.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, signal};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn batch_runs_observer_once_with_final_value() {
        let s = signal(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let o = seen.clone();
        let _fx = effect(move || o.borrow_mut().push(s.get()));

        batch(|| {
            s.set(1);
            s.set(2);
        })
        .unwrap();

        assert_eq!(*seen.borrow(), vec![0, 2]);
    }

    #[test]
    fn nested_batches_flush_at_outermost() {
        let s = signal(0);
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let _fx = effect(move || {
            s.get();
            r.set(r.get() + 1);
        });

        batch(|| {
            s.set(1);
            batch(|| s.set(2)).unwrap();
            assert_eq!(runs.get(), 1);
            s.set(3);
        })
        .unwrap();

        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn effects_flush_in_insertion_order() {
        let a = signal(0);
        let b = signal(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        let o = order.clone();
        let _first = effect(move || {
            b.get();
            o.borrow_mut().push("b-reader");
        });
        let o = order.clone();
        let _second = effect(move || {
            a.get();
            o.borrow_mut().push("a-reader");
        });
        order.borrow_mut().clear();

        batch(|| {
            a.set(1);
            b.set(1);
        })
        .unwrap();

        assert_eq!(*order.borrow(), vec!["a-reader", "b-reader"]);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let tracked = signal(0);
        let hidden = signal(0);
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let _fx = effect(move || {
            tracked.get();
            untrack(|| hidden.get());
            r.set(r.get() + 1);
        });

        hidden.set(1);
        assert_eq!(runs.get(), 1);
        assert_eq!(hidden.subscriber_count(), 0);

        tracked.set(1);
        assert_eq!(runs.get(), 2);
    }
}
