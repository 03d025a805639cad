//! Child list reconciliation.

use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

use super::mounted::{unmount_children, MountedNode};
use super::Cx;
use crate::dom::Node;
use crate::error::Result;
use crate::vnode::VNode;

/// Reconcile the mounted `prev` list against `next`, inside `parent` and
/// before `before`.
///
/// Old children are matched by key, then unkeyed ones by position among the
/// unkeyed. Matched children are patched and moved only when out of place;
/// unmatched old children are unmounted and new ones mounted. On error
/// `prev` still holds every child that is mounted.
pub fn reconcile_children(
    prev: &mut Vec<MountedNode>,
    next: &[VNode],
    parent: &Node,
    before: Option<&Node>,
    cx: &Cx,
) -> Result<()> {
    let mut old: Vec<Option<MountedNode>> = mem::take(prev).into_iter().map(Some).collect();

    let mut keyed: HashMap<Rc<str>, usize> = HashMap::new();
    let mut unkeyed: Vec<usize> = Vec::new();
    for (index, child) in old.iter().enumerate() {
        let Some(child) = child else { continue };
        match child.vnode().key() {
            Some(key) => {
                if keyed.insert(Rc::from(key), index).is_some() {
                    tracing::warn!(key, "duplicate key among children");
                }
            }
            None => unkeyed.push(index),
        }
    }

    let mut unkeyed = unkeyed.into_iter();
    let mut matched: Vec<Option<MountedNode>> = next
        .iter()
        .map(|vnode| {
            let index = match vnode.key() {
                Some(key) => keyed.remove(key),
                None => unkeyed.next(),
            };
            let index = index.filter(|&i| old[i].as_ref().is_some_and(|m| m.vnode().same_slot(vnode)))?;
            old[index].take()
        })
        .collect();

    unmount_children(old.into_iter().flatten().collect(), cx, true);

    // Walk backwards so every child has its final next sibling in place.
    let mut placed: Vec<MountedNode> = Vec::with_capacity(next.len());
    let mut anchor = before.cloned();
    for (index, vnode) in next.iter().enumerate().rev() {
        let outcome = match matched[index].take() {
            Some(mut child) => {
                let result = child.patch(vnode, parent, cx).and_then(|()| {
                    if child.last_dom().next_sibling() != anchor {
                        child.move_before(parent, anchor.as_ref())
                    } else {
                        Ok(())
                    }
                });
                match result {
                    Ok(()) => Ok(child),
                    Err(err) => Err((Some(child), err)),
                }
            }
            None => MountedNode::mount(vnode, parent, anchor.as_ref(), cx).map_err(|err| (None, err)),
        };

        match outcome {
            Ok(child) => {
                anchor = Some(child.first_dom());
                placed.push(child);
            }
            Err((child, err)) => {
                prev.extend(matched.into_iter().flatten());
                prev.extend(child);
                prev.extend(placed.into_iter().rev());
                return Err(err);
            }
        }
    }

    placed.reverse();
    *prev = placed;
    Ok(())
}
