//! Mounted vnode state.

use std::mem;
use std::rc::Rc;

use super::children::reconcile_children;
use super::props::ElementProps;
use super::Cx;
use crate::component::Instance;
use crate::dom::{document, Node};
use crate::error::{Error, Result};
use crate::reactive::Effect;
use crate::vnode::{PropValue, SignalSource, VNode, VNodeType, CONTAINER_PROP, TEXT_PROP};

/// A vnode applied to the DOM, together with everything it owns.
pub enum MountedNode {
    Text {
        vnode: VNode,
        node: Node,
        binding: Option<Effect>,
    },
    Element {
        vnode: VNode,
        node: Node,
        props: ElementProps,
        children: Vec<MountedNode>,
    },
    Fragment {
        vnode: VNode,
        start: Node,
        end: Node,
        children: Vec<MountedNode>,
    },
    Portal {
        vnode: VNode,
        anchor: Node,
        container: Node,
        children: Vec<MountedNode>,
    },
    Component {
        vnode: VNode,
        instance: Instance,
    },
}

impl MountedNode {
    /// Create the DOM for `vnode` and insert it into `parent` before
    /// `before`. On error nothing is left in the DOM.
    pub fn mount(vnode: &VNode, parent: &Node, before: Option<&Node>, cx: &Cx) -> Result<Self> {
        match vnode.ty() {
            VNodeType::Text => {
                let node = document().create_text_node("");
                let binding = write_text(&node, vnode.prop(TEXT_PROP))?;
                if let Err(err) = parent.insert_before(&node, before) {
                    if let Some(binding) = binding {
                        binding.dispose();
                    }
                    return Err(err.into());
                }
                Ok(MountedNode::Text {
                    vnode: vnode.clone(),
                    node,
                    binding,
                })
            }
            VNodeType::Element(tag) => {
                let node = document().create_element(tag);
                let mut props = ElementProps::default();
                let built = props
                    .apply(&node, vnode.props(), cx)
                    .and_then(|()| mount_children(vnode.children(), &node, None, cx));
                let children = match built {
                    Ok(children) => children,
                    Err(err) => {
                        props.dispose(&node);
                        return Err(err);
                    }
                };
                if let Err(err) = parent.insert_before(&node, before) {
                    unmount_children(children, cx, false);
                    props.dispose(&node);
                    return Err(err.into());
                }
                if let Some(node_ref) = vnode.node_ref() {
                    node_ref.set(Some(&node));
                }
                Ok(MountedNode::Element {
                    vnode: vnode.clone(),
                    node,
                    props,
                    children,
                })
            }
            VNodeType::Fragment => {
                let start = document().create_comment("");
                let end = document().create_comment("");
                parent.insert_before(&start, before)?;
                if let Err(err) = parent.insert_before(&end, before) {
                    start.remove();
                    return Err(err.into());
                }
                match mount_children(vnode.children(), parent, Some(&end), cx) {
                    Ok(children) => Ok(MountedNode::Fragment {
                        vnode: vnode.clone(),
                        start,
                        end,
                        children,
                    }),
                    Err(err) => {
                        start.remove();
                        end.remove();
                        Err(err)
                    }
                }
            }
            VNodeType::Portal => {
                let container = portal_container(vnode)?;
                let anchor = document().create_comment("portal");
                parent.insert_before(&anchor, before)?;
                match mount_children(vnode.children(), &container, None, &cx.for_portal()) {
                    Ok(children) => Ok(MountedNode::Portal {
                        vnode: vnode.clone(),
                        anchor,
                        container,
                        children,
                    }),
                    Err(err) => {
                        anchor.remove();
                        Err(err)
                    }
                }
            }
            VNodeType::Component(component) => {
                let instance = Instance::create(vnode, component, cx)?;
                instance.mount(parent, before)?;
                Ok(MountedNode::Component {
                    vnode: vnode.clone(),
                    instance,
                })
            }
        }
    }

    /// Bring this node in line with `next`. On error the node is still
    /// consistent and can be patched again or unmounted.
    pub fn patch(&mut self, next: &VNode, parent: &Node, cx: &Cx) -> Result<()> {
        if !self.vnode().same_slot(next) || self.container_changed(next) {
            return self.replace(next, parent, cx);
        }

        match self {
            MountedNode::Text { vnode, node, binding } => {
                let previous = vnode.prop(TEXT_PROP);
                let incoming = next.prop(TEXT_PROP);
                let unchanged = match (previous, incoming) {
                    (Some(a), Some(b)) => a.same(b),
                    (None, None) => true,
                    _ => false,
                };
                if !unchanged {
                    if let Some(old) = binding.take() {
                        old.dispose();
                    }
                    *binding = write_text(node, incoming)?;
                }
                *vnode = next.clone();
            }
            MountedNode::Element {
                vnode,
                node,
                props,
                children,
            } => {
                props.apply(node, next.props(), cx)?;
                reconcile_children(children, next.children(), node, None, cx)?;
                match (vnode.node_ref(), next.node_ref()) {
                    (_, Some(node_ref)) => node_ref.set(Some(&*node)),
                    (Some(node_ref), None) => node_ref.set(None),
                    (None, None) => {}
                }
                *vnode = next.clone();
            }
            MountedNode::Fragment {
                vnode, end, children, ..
            } => {
                reconcile_children(children, next.children(), parent, Some(&*end), cx)?;
                *vnode = next.clone();
            }
            MountedNode::Portal {
                vnode,
                container,
                children,
                ..
            } => {
                reconcile_children(children, next.children(), container, None, &cx.for_portal())?;
                *vnode = next.clone();
            }
            MountedNode::Component { vnode, instance } => {
                *vnode = next.clone();
                instance.receive(next)?;
            }
        }
        Ok(())
    }

    fn replace(&mut self, next: &VNode, parent: &Node, cx: &Cx) -> Result<()> {
        let before = self.first_dom();
        let fresh = MountedNode::mount(next, parent, Some(&before), cx)?;
        let old = mem::replace(self, fresh);
        old.unmount(cx, true);
        Ok(())
    }

    fn container_changed(&self, next: &VNode) -> bool {
        match self {
            MountedNode::Portal { container, .. } => portal_container(next).map_or(true, |c| c != *container),
            _ => false,
        }
    }

    /// Dispose listeners, bindings and component instances below this node.
    /// With `detach` the node's top-level DOM is removed as well; without
    /// it the caller is removing an ancestor.
    pub fn unmount(self, cx: &Cx, detach: bool) {
        match self {
            MountedNode::Text { node, binding, .. } => {
                if let Some(binding) = binding {
                    binding.dispose();
                }
                if detach {
                    node.remove();
                }
            }
            MountedNode::Element {
                vnode,
                node,
                mut props,
                children,
            } => {
                props.dispose(&node);
                unmount_children(children, cx, false);
                if let Some(node_ref) = vnode.node_ref() {
                    node_ref.set(None);
                }
                if detach {
                    node.remove();
                }
            }
            MountedNode::Fragment {
                start, end, children, ..
            } => {
                unmount_children(children, cx, detach);
                if detach {
                    start.remove();
                    end.remove();
                }
            }
            MountedNode::Portal {
                anchor, children, ..
            } => {
                unmount_children(children, &cx.for_portal(), true);
                if detach {
                    anchor.remove();
                }
            }
            MountedNode::Component { instance, .. } => instance.unmount(detach),
        }
    }

    pub fn vnode(&self) -> &VNode {
        match self {
            MountedNode::Text { vnode, .. }
            | MountedNode::Element { vnode, .. }
            | MountedNode::Fragment { vnode, .. }
            | MountedNode::Portal { vnode, .. }
            | MountedNode::Component { vnode, .. } => vnode,
        }
    }

    /// The component instance, for component nodes.
    pub fn instance(&self) -> Option<&Instance> {
        match self {
            MountedNode::Component { instance, .. } => Some(instance),
            _ => None,
        }
    }

    /// Top-level DOM nodes owned by this node, in document order.
    pub fn dom_nodes(&self) -> Vec<Node> {
        match self {
            MountedNode::Text { node, .. } | MountedNode::Element { node, .. } => vec![node.clone()],
            MountedNode::Fragment {
                start, end, children, ..
            } => {
                let mut nodes = vec![start.clone()];
                nodes.extend(children.iter().flat_map(MountedNode::dom_nodes));
                nodes.push(end.clone());
                nodes
            }
            MountedNode::Portal { anchor, .. } => vec![anchor.clone()],
            MountedNode::Component { instance, .. } => instance.dom_nodes(),
        }
    }

    pub fn first_dom(&self) -> Node {
        match self {
            MountedNode::Text { node, .. } | MountedNode::Element { node, .. } => node.clone(),
            MountedNode::Fragment { start, .. } => start.clone(),
            MountedNode::Portal { anchor, .. } => anchor.clone(),
            MountedNode::Component { instance, .. } => instance.first_dom(),
        }
    }

    pub fn last_dom(&self) -> Node {
        match self {
            MountedNode::Text { node, .. } | MountedNode::Element { node, .. } => node.clone(),
            MountedNode::Fragment { end, .. } => end.clone(),
            MountedNode::Portal { anchor, .. } => anchor.clone(),
            MountedNode::Component { instance, .. } => instance.last_dom(),
        }
    }

    /// Move this node's DOM before `before` without touching its state.
    pub fn move_before(&self, parent: &Node, before: Option<&Node>) -> Result<()> {
        for node in self.dom_nodes() {
            parent.insert_before(&node, before)?;
        }
        Ok(())
    }

    /// Listeners attached by this node and its descendants, portals
    /// included. Delegated handlers count too.
    pub fn listener_count(&self) -> usize {
        match self {
            MountedNode::Text { .. } => 0,
            MountedNode::Element { props, children, .. } => {
                props.listener_count() + children.iter().map(MountedNode::listener_count).sum::<usize>()
            }
            MountedNode::Fragment { children, .. } | MountedNode::Portal { children, .. } => {
                children.iter().map(MountedNode::listener_count).sum()
            }
            MountedNode::Component { instance, .. } => instance.listener_count(),
        }
    }

    /// Push the nearest component instances below this node.
    pub fn collect_instances(&self, out: &mut Vec<Instance>) {
        match self {
            MountedNode::Text { .. } => {}
            MountedNode::Element { children, .. }
            | MountedNode::Fragment { children, .. }
            | MountedNode::Portal { children, .. } => {
                for child in children {
                    child.collect_instances(out);
                }
            }
            MountedNode::Component { instance, .. } => out.push(instance.clone()),
        }
    }
}

/// Mount `vnodes` in order before `before`. On error every node mounted so
/// far is unmounted again.
pub(super) fn mount_children(
    vnodes: &[VNode],
    parent: &Node,
    before: Option<&Node>,
    cx: &Cx,
) -> Result<Vec<MountedNode>> {
    let mut mounted = Vec::with_capacity(vnodes.len());
    for vnode in vnodes {
        match MountedNode::mount(vnode, parent, before, cx) {
            Ok(node) => mounted.push(node),
            Err(err) => {
                unmount_children(mounted, cx, true);
                return Err(err);
            }
        }
    }
    Ok(mounted)
}

pub(super) fn unmount_children(children: Vec<MountedNode>, cx: &Cx, detach: bool) {
    for child in children {
        child.unmount(cx, detach);
    }
}

/// Set the text of `node` from a text prop. A signal source gets a binding
/// effect, which is returned.
fn write_text(node: &Node, content: Option<&PropValue>) -> Result<Option<Effect>> {
    match content {
        Some(PropValue::Signal(source)) => bind_text(node, Rc::clone(source)).map(Some),
        Some(PropValue::Value(value)) => {
            node.set_data(&value.to_text())?;
            Ok(None)
        }
        _ => {
            node.set_data("")?;
            Ok(None)
        }
    }
}

fn bind_text(node: &Node, source: Rc<dyn SignalSource>) -> Result<Effect> {
    let target = node.clone();
    let binding = Effect::new_lazy(move || match source.read() {
        Ok(value) => {
            if let Err(err) = target.set_data(&value.to_text()) {
                tracing::warn!(%err, "text binding write failed");
            }
        }
        Err(err) => tracing::warn!(%err, "text binding read failed"),
    });
    if let Err(err) = binding.try_run() {
        binding.dispose();
        return Err(err);
    }
    Ok(binding)
}

fn portal_container(vnode: &VNode) -> Result<Node> {
    match vnode.prop(CONTAINER_PROP) {
        Some(PropValue::Container(container)) => Ok(container.clone()),
        _ => Err(Error::render("portal requires a container node")),
    }
}
