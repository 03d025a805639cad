//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computeds, and
//! effects. These primitives form the foundation of Sprig's fine-grained
//! reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a computed or effect), the signal
//! automatically registers that context as a dependent. When the signal's
//! value changes, all dependents are notified.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It re-evaluates
//! only when one of its dependencies changes, and only when read.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects are used to synchronize reactive state with
//! external systems, such as updating the DOM.
//!
//! # Implementation Notes
//!
//! Nodes live in three arenas (signals, computeds, effects) owned by a
//! thread-local runtime; edges are id-to-id relations. A thread-local
//! context stack records which observer is running so reads can subscribe
//! it automatically.

mod batch;
mod computed;
mod context;
mod effect;
mod pair;
mod resource;
mod runtime;
mod signal;
mod subscriber;

pub use batch::{batch, untrack};
pub use computed::{computed, Computed};
pub use context::ReactiveContext;
pub use effect::{effect, Effect, EffectOptions, IntoCleanup};
pub use pair::{create_signal, ReadSignal, WriteSignal};
pub use resource::{Resource, SuspendToken};
pub use runtime::{reentry_limit, set_reentry_limit, stats, Cleanup, ReactiveStats, DEFAULT_REENTRY_LIMIT};
pub use signal::{same_value, signal, try_signal, Signal};
pub use subscriber::{ComputedId, EffectId, NodeState, ObserverId, SignalId, SourceId};
