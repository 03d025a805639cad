//! Sprig Core
//!
//! This crate provides the core runtime for the Sprig reactive UI framework.
//! It implements:
//!
//! - Fine-grained reactive primitives (signals, computeds, effects)
//! - A batched component update scheduler
//! - Virtual nodes and a keyed reconciler over a host document
//! - Components with positional hooks, context, error and suspense
//!   boundaries
//! - An app host with plugins and lifecycle hooks
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: signal graph and dependency tracking
//! - `scheduler`: component update queue and tick backends
//! - `dom`: the host document the reconciler mutates
//! - `vnode`: virtual nodes, props and the `h` factory
//! - `hooks`: per-instance hook state behind a render [`Scope`]
//! - `component`: component definitions and instances
//! - `reconciler`: mount, patch and unmount of vnode trees
//! - `app`: the app host
//!
//! # Example
//!
//! ```rust,ignore
//! use sprig_core::{children, create_app, define_component, h, props, AppOptions, PropValue};
//!
//! let counter = define_component("Counter", |cx, _| {
//!     let (count, set_count) = cx.use_state(0)?;
//!     Ok(h(
//!         "button",
//!         props! { "onClick" => PropValue::handler(move |_| set_count.update(|c| c + 1)) },
//!         children!["clicked ", count, " times"],
//!     ))
//! });
//!
//! let app = create_app(counter, AppOptions::default());
//! let handle = app.mount("#app")?;
//! ```

pub mod app;
pub mod component;
pub mod config;
pub mod dom;
pub mod error;
pub mod hooks;
pub mod reactive;
pub mod reconciler;
pub mod scheduler;
pub mod vnode;

pub use app::{create_app, App, LifecycleEvent, LifecycleInfo, MountHandle, MountTarget, Plugin};
pub use component::{
    define_component, error_boundary, suspense, BoundaryHandle, Component, Instance,
    InstanceSnapshot, InstanceState,
};
pub use config::{AppOptions, EventMode, TickerKind};
pub use dom::{document, DomError, Event, Node};
pub use error::{Error, Result};
pub use hooks::{create_context, Context, MutableRef, Scope, SetState};
pub use reactive::{
    batch, computed, create_signal, effect, signal, untrack, Computed, Effect, ReadSignal,
    Resource, Signal, WriteSignal,
};
pub use reconciler::{reconcile, MountedNode};
pub use scheduler::{ManualTicker, Scheduler, Ticker};
pub use vnode::{
    create_portal, create_vnode, fragment, h, is_signal, Child, NodeRef, PropValue, Props, VNode,
    VNodeType, Value,
};
