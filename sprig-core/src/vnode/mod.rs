//! Virtual Nodes
//!
//! A [`VNode`] is the uniform description of one node in a declarative
//! tree. Every surface syntax ends up calling [`create_vnode`], so the
//! reconciler only ever sees one canonical shape:
//!
//! - text nodes use [`VNodeType::Text`] and carry their content (a value or
//!   a signal) in the `nodeValue` prop;
//! - element props are already normalized (`class`, `for`, lower-case
//!   `on<event>` handler keys, CSS text for `style`);
//! - children are flattened and never contain empty entries;
//! - keys and refs live on the vnode, never in the props.
//!
//! Two vnodes occupy the same slot iff their types and keys match.

mod child;
mod jsx;
mod value;

use std::fmt;
use std::rc::Rc;

use crate::component::Component;
use crate::dom::Node;
use crate::hooks::MutableRef;

pub use child::{normalize_children, Child};
pub use jsx::{h, normalize_prop_name};
pub use value::{is_signal, style_to_css, PropMap, PropValue, Props, SignalSource, Value};

/// Prop holding the content of a text vnode.
pub const TEXT_PROP: &str = "nodeValue";

/// Prop holding the target node of a portal.
pub const CONTAINER_PROP: &str = "container";

/// What a vnode describes.
#[derive(Clone, PartialEq)]
pub enum VNodeType {
    /// A text node (`#text`).
    Text,
    /// An HTML element by tag name.
    Element(Rc<str>),
    /// Children inserted in place without a wrapper element.
    Fragment,
    /// Children inserted into another container.
    Portal,
    /// A user component.
    Component(Component),
}

impl VNodeType {
    pub fn name(&self) -> &str {
        match self {
            VNodeType::Text => "#text",
            VNodeType::Element(tag) => tag,
            VNodeType::Fragment => "#fragment",
            VNodeType::Portal => "#portal",
            VNodeType::Component(component) => component.name(),
        }
    }
}

impl From<&str> for VNodeType {
    fn from(tag: &str) -> Self {
        VNodeType::Element(Rc::from(tag))
    }
}

impl From<Component> for VNodeType {
    fn from(component: Component) -> Self {
        VNodeType::Component(component)
    }
}

impl From<&Component> for VNodeType {
    fn from(component: &Component) -> Self {
        VNodeType::Component(component.clone())
    }
}

impl fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "<{}>", tag),
            VNodeType::Component(component) => write!(f, "<{}/>", component.name()),
            other => f.write_str(other.name()),
        }
    }
}

/// A reference to the DOM node a vnode mounts.
#[derive(Clone)]
pub enum NodeRef {
    /// Called with the node on mount and with `None` on unmount.
    Callback(Rc<dyn Fn(Option<&Node>)>),
    /// `current` is set on mount and cleared on unmount.
    Cell(MutableRef<Option<Node>>),
}

impl NodeRef {
    pub fn callback(f: impl Fn(Option<&Node>) + 'static) -> Self {
        NodeRef::Callback(Rc::new(f))
    }

    pub(crate) fn set(&self, node: Option<&Node>) {
        match self {
            NodeRef::Callback(f) => f(node),
            NodeRef::Cell(cell) => cell.set_current(node.cloned()),
        }
    }
}

impl From<MutableRef<Option<Node>>> for NodeRef {
    fn from(cell: MutableRef<Option<Node>>) -> Self {
        NodeRef::Cell(cell)
    }
}

struct VNodeData {
    ty: VNodeType,
    props: PropMap,
    children: Vec<VNode>,
    key: Option<Rc<str>>,
    node_ref: Option<NodeRef>,
}

/// An immutable virtual node. Clones share the same data.
#[derive(Clone)]
pub struct VNode(Rc<VNodeData>);

impl VNode {
    pub fn ty(&self) -> &VNodeType {
        &self.0.ty
    }

    pub fn props(&self) -> &PropMap {
        &self.0.props
    }

    pub fn prop(&self, name: &str) -> Option<&PropValue> {
        self.0.props.get(name)
    }

    pub fn children(&self) -> &[VNode] {
        &self.0.children
    }

    pub fn key(&self) -> Option<&str> {
        self.0.key.as_deref()
    }

    pub fn node_ref(&self) -> Option<&NodeRef> {
        self.0.node_ref.as_ref()
    }

    /// A static text vnode.
    pub fn text(value: impl Into<Value>) -> Self {
        let mut props = PropMap::new();
        props.insert(Rc::from(TEXT_PROP), PropValue::Value(value.into()));
        Self::build(VNodeType::Text, props, Vec::new(), None, None)
    }

    /// A text vnode whose content follows `source`.
    pub fn reactive_text(source: Rc<dyn SignalSource>) -> Self {
        let mut props = PropMap::new();
        props.insert(Rc::from(TEXT_PROP), PropValue::Signal(source));
        Self::build(VNodeType::Text, props, Vec::new(), None, None)
    }

    /// Copy of this vnode with a different key.
    pub fn with_key(&self, key: impl Into<Rc<str>>) -> Self {
        Self::build(
            self.0.ty.clone(),
            self.0.props.clone(),
            self.0.children.clone(),
            Some(key.into()),
            self.0.node_ref.clone(),
        )
    }

    /// Whether `self` and `other` occupy the same slot: same type and key.
    pub fn same_slot(&self, other: &VNode) -> bool {
        self.0.ty == other.0.ty && self.0.key == other.0.key
    }

    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn component(&self) -> Option<&Component> {
        match &self.0.ty {
            VNodeType::Component(component) => Some(component),
            _ => None,
        }
    }

    /// Props handed to a component render function.
    pub(crate) fn component_props(&self) -> Props {
        Props::new(self.0.props.clone(), self.0.children.clone())
    }

    fn build(
        ty: VNodeType,
        props: PropMap,
        children: Vec<VNode>,
        key: Option<Rc<str>>,
        node_ref: Option<NodeRef>,
    ) -> Self {
        Self(Rc::new(VNodeData {
            ty,
            props,
            children,
            key,
            node_ref,
        }))
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("type", &self.0.ty);
        if let Some(key) = &self.0.key {
            s.field("key", key);
        }
        if !self.0.props.is_empty() {
            s.field("props", &self.0.props);
        }
        if !self.0.children.is_empty() {
            s.field("children", &self.0.children);
        }
        s.finish()
    }
}

/// Build a vnode. Children are normalized: empty entries are dropped,
/// primitives and signals become text vnodes, nested lists are flattened.
pub fn create_vnode(
    ty: impl Into<VNodeType>,
    props: PropMap,
    children: Vec<Child>,
    key: Option<&str>,
    node_ref: Option<NodeRef>,
) -> VNode {
    let ty = ty.into();
    let children = match ty {
        VNodeType::Text => Vec::new(),
        _ => normalize_children(children),
    };
    VNode::build(ty, props, children, key.map(Rc::from), node_ref)
}

/// A fragment of `children`.
pub fn fragment(children: Vec<Child>) -> VNode {
    create_vnode(VNodeType::Fragment, PropMap::new(), children, None, None)
}

/// A fragment of already-built vnodes.
pub fn fragment_of(children: &[VNode]) -> VNode {
    VNode::build(VNodeType::Fragment, PropMap::new(), children.to_vec(), None, None)
}

/// Render `children` into `container` while keeping them owned by the
/// enclosing component.
pub fn create_portal(children: Vec<Child>, container: Node) -> VNode {
    let mut props = PropMap::new();
    props.insert(Rc::from(CONTAINER_PROP), PropValue::Container(container));
    create_vnode(VNodeType::Portal, props, children, None, None)
}

/// Build a child list from mixed values.
///
/// ```rust,ignore
/// let kids = children!["count: ", count, h("b", vec![], children!["!"])];
/// ```
#[macro_export]
macro_rules! children {
    ($($child:expr),* $(,)?) => {
        vec![$($crate::vnode::Child::from($child)),*]
    };
}

/// Build a prop list for [`h`].
///
/// ```rust,ignore
/// let props = props! { "className" => "btn", "onClick" => PropValue::handler(|_| ()) };
/// ```
#[macro_export]
macro_rules! props {
    ($($name:expr => $value:expr),* $(,)?) => {
        vec![$(($name, $crate::vnode::PropValue::from($value))),*]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::signal;

    #[test]
    fn same_slot_needs_type_and_key() {
        let a = h("li", vec![], vec![]).with_key("a");
        let a2 = h("li", vec![], children!["other"]).with_key("a");
        let b = h("li", vec![], vec![]).with_key("b");
        let div = h("div", vec![], vec![]).with_key("a");

        assert!(a.same_slot(&a2));
        assert!(!a.same_slot(&b));
        assert!(!a.same_slot(&div));
        assert!(VNode::text("x").same_slot(&VNode::text("y")));
    }

    #[test]
    fn text_vnodes_carry_node_value() {
        let count = signal(2);
        let static_text = VNode::text("hi");
        let live = VNode::reactive_text(Rc::new(count));

        assert_eq!(static_text.ty(), &VNodeType::Text);
        assert!(matches!(static_text.prop(TEXT_PROP), Some(PropValue::Value(_))));
        assert!(live.prop(TEXT_PROP).is_some_and(PropValue::is_signal));
    }

    #[test]
    fn portal_records_container() {
        let target = crate::dom::document().create_element("aside");
        let portal = create_portal(children!["modal"], target.clone());

        assert_eq!(portal.ty(), &VNodeType::Portal);
        assert!(matches!(portal.prop(CONTAINER_PROP), Some(PropValue::Container(n)) if *n == target));
        assert_eq!(portal.children().len(), 1);
    }
}
