//! Tick sources.
//!
//! A [`Ticker`] asks the host to call back "soon". The scheduler requests at
//! most one tick at a time and flushes its queue when the tick fires.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::config::TickerKind;

/// A deferred callback handed to a ticker.
pub type TickCallback = Box<dyn FnOnce()>;

/// Capability to run a callback at a later event-loop boundary.
pub trait Ticker {
    fn request_tick(&self, callback: TickCallback);

    fn kind(&self) -> TickerKind;
}

/// A ticker that only fires when [`ManualTicker::advance`] is called.
///
/// Clones share the same queue, so a test can keep one handle and give
/// another to the app.
#[derive(Clone, Default)]
pub struct ManualTicker {
    queue: Rc<RefCell<VecDeque<TickCallback>>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requested ticks that have not fired yet.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Fire every tick requested so far, including ticks requested while
    /// advancing. Returns how many fired.
    pub fn advance(&self) -> usize {
        let mut fired = 0;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(callback) => {
                    callback();
                    fired += 1;
                }
                None => return fired,
            }
        }
    }
}

impl Ticker for ManualTicker {
    fn request_tick(&self, callback: TickCallback) {
        self.queue.borrow_mut().push_back(callback);
    }

    fn kind(&self) -> TickerKind {
        TickerKind::Manual
    }
}

/// Runs the callback as a local task right after the current one yields.
///
/// Requires a `tokio::task::LocalSet`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrotaskTicker;

impl Ticker for MicrotaskTicker {
    fn request_tick(&self, callback: TickCallback) {
        tokio::task::spawn_local(async move { callback() });
    }

    fn kind(&self) -> TickerKind {
        TickerKind::Microtask
    }
}

/// Runs the callback once the local executor has had a chance to run other
/// ready work.
///
/// Requires a `tokio::task::LocalSet`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleTicker;

impl Ticker for IdleTicker {
    fn request_tick(&self, callback: TickCallback) {
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            callback();
        });
    }

    fn kind(&self) -> TickerKind {
        TickerKind::Idle
    }
}

/// Runs the callback after a timer of the given delay (zero by default).
///
/// Requires a `tokio::task::LocalSet` on a runtime with the time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutTicker {
    pub delay: Duration,
}

impl Ticker for TimeoutTicker {
    fn request_tick(&self, callback: TickCallback) {
        let delay = self.delay;
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
    }

    fn kind(&self) -> TickerKind {
        TickerKind::Timeout
    }
}

/// Build the ticker for a configured kind.
///
/// `Auto` prefers the idle ticker when a tokio runtime is current and falls
/// back to a manual ticker otherwise.
pub fn select_ticker(kind: TickerKind) -> Rc<dyn Ticker> {
    match kind {
        TickerKind::Auto => {
            if tokio::runtime::Handle::try_current().is_ok() {
                Rc::new(IdleTicker)
            } else {
                tracing::debug!("no async runtime; using manual ticker");
                Rc::new(ManualTicker::new())
            }
        }
        TickerKind::Idle => Rc::new(IdleTicker),
        TickerKind::Microtask => Rc::new(MicrotaskTicker),
        TickerKind::Timeout => Rc::new(TimeoutTicker::default()),
        TickerKind::Manual => Rc::new(ManualTicker::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn manual_ticker_fires_on_advance() {
        let ticker = ManualTicker::new();
        let fired = Rc::new(Cell::new(0));

        let f = fired.clone();
        let handle = ticker.clone();
        ticker.request_tick(Box::new(move || {
            f.set(f.get() + 1);
            let f = f.clone();
            handle.request_tick(Box::new(move || f.set(f.get() + 10)));
        }));

        assert_eq!(ticker.pending(), 1);
        assert_eq!(fired.get(), 0);
        assert_eq!(ticker.advance(), 2);
        assert_eq!(fired.get(), 11);
    }

    #[test]
    fn auto_without_runtime_is_manual() {
        assert_eq!(select_ticker(TickerKind::Auto).kind(), TickerKind::Manual);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn async_tickers_fire_on_local_set() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                for ticker in [
                    select_ticker(TickerKind::Microtask),
                    select_ticker(TickerKind::Idle),
                    select_ticker(TickerKind::Timeout),
                ] {
                    let (tx, rx) = tokio::sync::oneshot::channel();
                    ticker.request_tick(Box::new(move || {
                        let _ = tx.send(());
                    }));
                    rx.await.unwrap();
                }
            })
            .await;
    }
}
