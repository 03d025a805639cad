//! Host Document
//!
//! The reconciler talks to the host through this module: a document with
//! element, text, comment and fragment nodes, attributes, bubbling events
//! and listener registration keyed by identity tokens.
//!
//! Each thread owns one document, reachable through [`document`], the same
//! way browser code reaches the global `document`.

mod event;
mod node;

use thiserror::Error;

pub use event::{Event, EventHandler, ListenerId};
pub use node::{Node, NodeKind};

/// Failures raised by DOM mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    /// The reference or removed node is not a child of the target.
    #[error("{0} is not a child of this node")]
    NotAChild(String),

    /// The insertion would create a cycle or targets a leaf node.
    #[error("hierarchy request error: {0}")]
    HierarchyRequest(String),

    /// The operation does not apply to this kind of node.
    #[error("operation not supported on {0}")]
    InvalidNodeType(String),

    /// No element matched a mount selector.
    #[error("no element matches selector {0:?}")]
    SelectorNotFound(String),
}

/// The host document.
#[derive(Clone, Debug)]
pub struct Document {
    root: Node,
    body: Node,
}

thread_local! {
    static DOCUMENT: Document = Document::new();
}

/// This thread's document.
pub fn document() -> Document {
    DOCUMENT.with(Document::clone)
}

impl Document {
    /// Create a standalone document with an empty `<body>`.
    pub fn new() -> Self {
        let root = Node::new(NodeKind::Document, "");
        let body = Node::new(NodeKind::Element("body".into()), "");
        // A fresh element can always be appended to a fresh document node.
        let _ = root.append_child(&body);
        Self { root, body }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn body(&self) -> &Node {
        &self.body
    }

    pub fn create_element(&self, tag: &str) -> Node {
        Node::new(NodeKind::Element(tag.to_ascii_lowercase()), "")
    }

    pub fn create_text_node(&self, data: &str) -> Node {
        Node::new(NodeKind::Text, data)
    }

    pub fn create_comment(&self, data: &str) -> Node {
        Node::new(NodeKind::Comment, data)
    }

    pub fn create_document_fragment(&self) -> Node {
        Node::new(NodeKind::Fragment, "")
    }

    pub fn query_selector(&self, selector: &str) -> Option<Node> {
        self.root.query_selector(selector)
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<Node> {
        self.root.query_selector(&format!("#{id}"))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_has_body() {
        let doc = document();
        assert_eq!(doc.body().tag_name(), Some("body"));
        assert_eq!(doc.body().parent(), Some(doc.root().clone()));
    }

    #[test]
    fn thread_document_is_shared() {
        let app = document().create_element("div");
        app.set_attribute("id", "app").unwrap();
        document().body().append_child(&app).unwrap();

        assert_eq!(document().get_element_by_id("app"), Some(app.clone()));
        app.remove();
        assert!(document().get_element_by_id("app").is_none());
    }
}
