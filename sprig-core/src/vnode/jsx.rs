//! JSX-style element factory.
//!
//! `h(type, props, children)` mirrors the factory call a JSX compiler
//! emits. Element prop names are normalized here so the reconciler only
//! sees canonical keys:
//!
//! | input | canonical |
//! |---|---|
//! | `className` | `class` |
//! | `htmlFor` | `for` |
//! | `onClick`, `@click` | `onclick` |
//! | `style` map | CSS text |
//! | `dangerouslySetInnerHTML` | `innerHTML` |
//!
//! `key` and `ref` are lifted onto the vnode.

use std::borrow::Cow;
use std::rc::Rc;

use super::value::{style_to_css, PropMap, PropValue, Value};
use super::{create_vnode, Child, NodeRef, VNode, VNodeType};

/// Map a surface prop name to its canonical key.
pub fn normalize_prop_name(name: &str) -> Cow<'_, str> {
    match name {
        "className" => return Cow::Borrowed("class"),
        "htmlFor" => return Cow::Borrowed("for"),
        "dangerouslySetInnerHTML" => return Cow::Borrowed("innerHTML"),
        _ => {}
    }
    if let Some(event) = name.strip_prefix('@') {
        return Cow::Owned(format!("on{}", event.to_ascii_lowercase()));
    }
    if let Some(event) = name.strip_prefix("on") {
        if event.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Cow::Owned(format!("on{}", event.to_ascii_lowercase()));
        }
    }
    Cow::Borrowed(name)
}

/// Build a vnode from a JSX-style call.
///
/// Element props are normalized; component props are passed through
/// untouched apart from `key` and `ref`.
pub fn h<'a>(
    ty: impl Into<VNodeType>,
    props: impl IntoIterator<Item = (&'a str, PropValue)>,
    children: Vec<Child>,
) -> VNode {
    let ty = ty.into();
    let is_element = matches!(ty, VNodeType::Element(_));

    let mut key = None;
    let mut node_ref = None;
    let mut map = PropMap::new();

    for (name, value) in props {
        match name {
            "key" => {
                key = value.as_value().map(Value::to_text);
                continue;
            }
            "ref" => {
                node_ref = match value {
                    PropValue::Data(data) => data.downcast::<NodeRef>().ok().map(|r| (*r).clone()),
                    _ => None,
                };
                if node_ref.is_none() {
                    tracing::warn!("ignoring ref prop that is not a NodeRef");
                }
                continue;
            }
            _ => {}
        }

        if !is_element {
            map.insert(Rc::from(name), value);
            continue;
        }

        let canonical = normalize_prop_name(name);
        let value = match (canonical.as_ref(), value) {
            ("style", PropValue::Style(decls)) => PropValue::Value(Value::from(style_to_css(&decls))),
            (_, value) => value,
        };
        map.insert(Rc::from(canonical.as_ref()), value);
    }

    create_vnode(ty, map, children, key.as_deref(), node_ref)
}

impl PropValue {
    /// Wrap a node ref so it can be passed as the `ref` prop of [`h`].
    pub fn node_ref(node_ref: NodeRef) -> Self {
        PropValue::data(node_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::children;

    #[test]
    fn prop_names_are_canonical() {
        assert_eq!(normalize_prop_name("className"), "class");
        assert_eq!(normalize_prop_name("htmlFor"), "for");
        assert_eq!(normalize_prop_name("onClick"), "onclick");
        assert_eq!(normalize_prop_name("@keyDown"), "onkeydown");
        assert_eq!(normalize_prop_name("dangerouslySetInnerHTML"), "innerHTML");
        assert_eq!(normalize_prop_name("one"), "one");
        assert_eq!(normalize_prop_name("id"), "id");
    }

    #[test]
    fn factory_lifts_key_and_ref() {
        let node_ref = NodeRef::callback(|_| {});
        let vnode = h(
            "button",
            [
                ("key", PropValue::from("k1")),
                ("ref", PropValue::node_ref(node_ref)),
                ("className", PropValue::from("primary")),
                ("style", PropValue::style([("fontSize", "12px")])),
                ("onClick", PropValue::handler(|_| {})),
            ],
            children!["Go"],
        );

        assert_eq!(vnode.key(), Some("k1"));
        assert!(vnode.node_ref().is_some());
        assert!(vnode.prop("key").is_none());
        assert!(vnode.prop("ref").is_none());
        assert_eq!(vnode.prop("class").and_then(PropValue::as_value), Some(&Value::from("primary")));
        assert_eq!(
            vnode.prop("style").and_then(PropValue::as_value),
            Some(&Value::from("font-size: 12px"))
        );
        assert!(matches!(vnode.prop("onclick"), Some(PropValue::Handler(_))));
    }
}
