//! Prop values.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::VNode;
use crate::dom::{Event, EventHandler, Node};
use crate::error::Result;
use crate::reactive::{same_value, Computed, ReadSignal, Signal, SourceId};

/// A primitive value carried by a prop or a text node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
}

impl Value {
    /// Attribute text for this value, or `None` if the attribute should be
    /// removed. `true` maps to the empty string.
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some(String::new()),
            other => Some(other.to_text()),
        }
    }

    /// Text-node content for this value.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Value-identity comparison (NaN equals NaN).
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => same_value(a, b),
            (a, b) => a == b,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v $(as $cast)?)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int as i64,
    i64 => Int,
    u32 => Int as i64,
    usize => Int as i64,
    f32 => Float as f64,
    f64 => Float,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Rc::from(v))
    }
}

impl From<Rc<str>> for Value {
    fn from(v: Rc<str>) -> Self {
        Value::Str(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Str(Rc::from(v.to_string()))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// A reactive source that can be bound to a DOM property.
pub trait SignalSource {
    /// Read the current value, subscribing the running observer.
    fn read(&self) -> Result<Value>;

    /// Identity of the underlying graph node.
    fn source_id(&self) -> SourceId;
}

impl<T> SignalSource for Signal<T>
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn read(&self) -> Result<Value> {
        self.try_get().map(Into::into)
    }

    fn source_id(&self) -> SourceId {
        SourceId::Signal(self.id())
    }
}

impl<T> SignalSource for ReadSignal<T>
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn read(&self) -> Result<Value> {
        self.try_get().map(Into::into)
    }

    fn source_id(&self) -> SourceId {
        SourceId::Signal(self.signal().id())
    }
}

impl<T> SignalSource for Computed<T>
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn read(&self) -> Result<Value> {
        self.try_get().map(Into::into)
    }

    fn source_id(&self) -> SourceId {
        SourceId::Computed(self.id())
    }
}

/// The value of one prop.
#[derive(Clone)]
pub enum PropValue {
    /// A plain attribute value.
    Value(Value),
    /// A reactive value; the reconciler binds it with a local effect.
    Signal(Rc<dyn SignalSource>),
    /// An event handler (`on<event>` keys).
    Handler(EventHandler),
    /// A style declaration map, serialized to CSS text.
    Style(IndexMap<Rc<str>, Value>),
    /// Arbitrary data passed to a component.
    Data(Rc<dyn Any>),
    /// A DOM node, used as a portal target.
    Container(Node),
}

impl PropValue {
    pub fn signal<S: SignalSource + 'static>(source: S) -> Self {
        PropValue::Signal(Rc::new(source))
    }

    pub fn handler(f: impl Fn(&Event) + 'static) -> Self {
        PropValue::Handler(Rc::new(f))
    }

    pub fn data<T: 'static>(value: T) -> Self {
        PropValue::Data(Rc::new(value))
    }

    pub fn style<K, V>(decls: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        PropValue::Style(
            decls
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Whether this prop carries a reactive source.
    pub fn is_signal(&self) -> bool {
        matches!(self, PropValue::Signal(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PropValue::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Whether two props would produce the same DOM state. Closures and
    /// data compare by identity, signals by the node they read.
    pub fn same(&self, other: &PropValue) -> bool {
        match (self, other) {
            (PropValue::Value(a), PropValue::Value(b)) => a.same(b),
            (PropValue::Signal(a), PropValue::Signal(b)) => a.source_id() == b.source_id(),
            (PropValue::Handler(a), PropValue::Handler(b)) => Rc::ptr_eq(a, b),
            (PropValue::Style(a), PropValue::Style(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|((ka, va), (kb, vb))| ka == kb && va.same(vb))
            }
            (PropValue::Data(a), PropValue::Data(b)) => Rc::ptr_eq(a, b),
            (PropValue::Container(a), PropValue::Container(b)) => a == b,
            _ => false,
        }
    }
}

/// Whether a prop carries a reactive source.
pub fn is_signal(value: &PropValue) -> bool {
    value.is_signal()
}

macro_rules! prop_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for PropValue {
                fn from(v: $ty) -> Self {
                    PropValue::Value(v.into())
                }
            }
        )*
    };
}

prop_from_value!(Value, bool, i32, i64, u32, usize, f32, f64, &str, String, Rc<str>, char);

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            PropValue::Signal(s) => f.debug_tuple("Signal").field(&s.source_id()).finish(),
            PropValue::Handler(_) => f.write_str("Handler"),
            PropValue::Style(s) => f.debug_tuple("Style").field(s).finish(),
            PropValue::Data(_) => f.write_str("Data"),
            PropValue::Container(n) => f.debug_tuple("Container").field(n).finish(),
        }
    }
}

/// Serialize a style map to CSS text, e.g. `color: red; margin-top: 4px`.
pub fn style_to_css(style: &IndexMap<Rc<str>, Value>) -> String {
    style
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_attribute()?;
            Some(format!("{}: {}", kebab_case(name), value))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn kebab_case(name: &str) -> String {
    if name.starts_with("--") {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Ordered prop map of a vnode.
pub type PropMap = IndexMap<Rc<str>, PropValue>;

/// Props as seen by a component's render function.
#[derive(Clone, Default)]
pub struct Props {
    values: PropMap,
    children: Vec<VNode>,
}

impl Props {
    pub fn new(values: PropMap, children: Vec<VNode>) -> Self {
        Self { values, children }
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.values.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(PropValue::as_value)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(Value::as_int)
    }

    pub fn handler(&self, name: &str) -> Option<EventHandler> {
        match self.get(name) {
            Some(PropValue::Handler(h)) => Some(Rc::clone(h)),
            _ => None,
        }
    }

    /// Typed data passed with [`PropValue::data`].
    pub fn data<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        match self.get(name) {
            Some(PropValue::Data(data)) => Rc::clone(data).downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub fn values(&self) -> &PropMap {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.children.is_empty()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("values", &self.values)
            .field("children", &self.children.len())
            .finish()
    }
}
