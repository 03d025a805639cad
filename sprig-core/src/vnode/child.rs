//! Children normalization.

use std::rc::Rc;

use super::value::{SignalSource, Value};
use super::VNode;
use crate::reactive::{Computed, ReadSignal, Signal};

/// One entry of a child list before normalization.
#[derive(Clone)]
pub enum Child {
    /// Dropped (null, unit, booleans).
    Empty,
    /// Becomes a text vnode.
    Value(Value),
    /// Becomes a text vnode bound to the source.
    Signal(Rc<dyn SignalSource>),
    Node(VNode),
    /// Flattened in place.
    List(Vec<Child>),
}

/// Flatten a child list into vnodes.
pub fn normalize_children(children: Vec<Child>) -> Vec<VNode> {
    let mut out = Vec::with_capacity(children.len());
    push_children(children, &mut out);
    out
}

fn push_children(children: Vec<Child>, out: &mut Vec<VNode>) {
    for child in children {
        match child {
            Child::Empty | Child::Value(Value::Null) => {}
            Child::Value(Value::Bool(_)) => {}
            Child::Value(value) => out.push(VNode::text(value)),
            Child::Signal(source) => out.push(VNode::reactive_text(source)),
            Child::Node(node) => out.push(node),
            Child::List(list) => push_children(list, out),
        }
    }
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<&VNode> for Child {
    fn from(node: &VNode) -> Self {
        Child::Node(node.clone())
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Empty
    }
}

impl From<Value> for Child {
    fn from(value: Value) -> Self {
        Child::Value(value)
    }
}

macro_rules! child_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Child {
                fn from(v: $ty) -> Self {
                    Child::Value(Value::from(v))
                }
            }
        )*
    };
}

child_from_value!(i32, i64, u32, usize, f32, f64, &str, String, Rc<str>, char);

impl<T> From<Signal<T>> for Child
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        Child::Signal(Rc::new(signal))
    }
}

impl<T> From<ReadSignal<T>> for Child
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn from(signal: ReadSignal<T>) -> Self {
        Child::Signal(Rc::new(signal))
    }
}

impl<T> From<Computed<T>> for Child
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn from(computed: Computed<T>) -> Self {
        Child::Signal(Rc::new(computed))
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(child: Option<T>) -> Self {
        child.map_or(Child::Empty, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(list: Vec<T>) -> Self {
        Child::List(list.into_iter().map(Into::into).collect())
    }
}
