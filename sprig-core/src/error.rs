//! Error Types
//!
//! Every failure the core can report is a variant of [`Error`]. Reactive
//! graph violations (disposed signals, computed writes, divergent batches,
//! misplaced hooks) surface synchronously to the caller. Render and commit
//! failures travel up the instance tree to the nearest error boundary.

use std::fmt;

use thiserror::Error;

use crate::dom::DomError;
use crate::reactive::SuspendToken;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All error kinds raised by the reactive core.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A signal was created with a callable as its initial value.
    #[error("signal initial value must not be a function; use computed() instead")]
    InvalidInitial,

    /// A signal was read or written after it was disposed.
    #[error("signal has been disposed")]
    DisposedSignal,

    /// A computed value was assigned to.
    #[error("computed values are read-only")]
    ComputedWrite,

    /// A computed value read itself while it was being computed.
    #[error("cyclic computed dependency detected")]
    ComputedCycle,

    /// An effect kept re-enqueueing itself during a single flush.
    #[error("batch flush did not settle after {limit} re-entries of one effect")]
    BatchDivergence { limit: u32 },

    /// A hook was called while no component was rendering.
    #[error("hook called outside of a component render")]
    HookContextMissing,

    /// The number or kind of hook calls changed between renders.
    #[error("hook order changed between renders: expected {expected}, found {found}")]
    HookOrderMismatch { expected: String, found: String },

    /// A user render function failed.
    #[error("render error in <{component}>: {message}")]
    Render {
        component: String,
        message: String,
        trace: ComponentTrace,
    },

    /// A DOM mutation failed while committing a render.
    #[error("commit failed: {0}")]
    Commit(#[from] DomError),

    /// A resource read inside render is still loading.
    #[error("render suspended on a pending resource")]
    Pending(SuspendToken),

    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Build a render error from any message. The trace is filled in as the
    /// error travels up the instance tree.
    pub fn render(message: impl Into<String>) -> Self {
        Error::Render {
            component: String::from("anonymous"),
            message: message.into(),
            trace: ComponentTrace::default(),
        }
    }

    /// Whether this error is caught by error boundaries.
    pub fn is_boundary_error(&self) -> bool {
        matches!(self, Error::Render { .. } | Error::Commit(_))
    }

    /// Attach the name of the instance this error passed through.
    pub(crate) fn with_component(mut self, name: &str) -> Self {
        if let Error::Render {
            component, trace, ..
        } = &mut self
        {
            if component == "anonymous" && trace.0.is_empty() {
                *component = name.to_string();
            }
            trace.0.push(name.to_string());
        }
        self
    }

    /// The component trace, innermost first. Empty for non-render errors.
    pub fn trace(&self) -> &[String] {
        match self {
            Error::Render { trace, .. } => &trace.0,
            _ => &[],
        }
    }
}

/// Names of the component instances a render error passed through,
/// innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentTrace(pub Vec<String>);

impl fmt::Display for ComponentTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, name) in self.0.iter().enumerate() {
            if depth > 0 {
                f.write_str(" <- ")?;
            }
            write!(f, "<{}>", name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_error_collects_trace() {
        let err = Error::render("boom")
            .with_component("Broken")
            .with_component("Layout")
            .with_component("App");

        match &err {
            Error::Render { component, .. } => assert_eq!(component, "Broken"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.trace(), ["Broken", "Layout", "App"]);
        assert!(err.is_boundary_error());
    }

    #[test]
    fn trace_display() {
        let trace = ComponentTrace(vec!["Leaf".into(), "Root".into()]);
        assert_eq!(trace.to_string(), "<Leaf> <- <Root>");
    }

    #[test]
    fn graph_errors_are_not_caught_by_boundaries() {
        assert!(!Error::DisposedSignal.is_boundary_error());
        assert!(!Error::BatchDivergence { limit: 3 }.is_boundary_error());
        assert!(!Error::HookContextMissing.is_boundary_error());
    }
}
