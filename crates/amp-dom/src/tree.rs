//! Owned, serializable node tree.
//!
//! This is the interchange format between an external HTML parser (or the
//! fixture reader) and the arena-backed [`Document`]. It round-trips through
//! JSON with `serde`.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::node::{Attribute, NodeId, NodeKind};
use crate::DocumentError;

/// A whole document as nested nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctype: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeTree>,
}

/// One node with its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeTree {
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attributes: Vec<Attribute>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<NodeTree>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

impl NodeTree {
    fn is_blank_text(&self) -> bool {
        matches!(self, NodeTree::Text { text } if text.trim().is_empty())
    }
}

impl Document {
    /// Build a document from a node tree.
    ///
    /// The `<html>`, `<head>` and `<body>` elements are located (or created);
    /// stray top-level content lands in `<body>`. The CSS budget is computed
    /// from the resulting `<style amp-custom>`.
    pub fn from_tree(tree: DocumentTree) -> Document {
        let mut doc = Document::new();
        doc.set_doctype(tree.doctype);
        let (root, head, body) = (doc.root(), doc.head(), doc.body());

        for node in tree.children {
            match node {
                NodeTree::Element {
                    tag,
                    attributes,
                    children,
                } if tag == "html" => {
                    copy_attributes(&mut doc, root, attributes);
                    for child in children {
                        place_top_level(&mut doc, child, head, body);
                    }
                }
                other => place_top_level(&mut doc, other, head, body),
            }
        }

        doc.recount_css_budget();
        doc
    }

    /// Deserialize a document from the JSON node-tree format.
    pub fn from_json(json: &str) -> Result<Document, DocumentError> {
        let tree: DocumentTree = serde_json::from_str(json).map_err(|e| DocumentError {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        })?;
        Ok(Document::from_tree(tree))
    }

    /// Snapshot of the attached tree.
    pub fn to_tree(&self) -> DocumentTree {
        DocumentTree {
            doctype: self.doctype().map(str::to_string),
            children: vec![self.node_tree(self.root())],
        }
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(&self.to_tree()).map_err(|e| DocumentError {
            message: e.to_string(),
            line: 0,
            column: 0,
        })
    }

    fn node_tree(&self, id: NodeId) -> NodeTree {
        match self.kind(id) {
            NodeKind::Element(el) => NodeTree::Element {
                tag: el.tag.clone(),
                attributes: el.attributes.clone(),
                children: self
                    .children(id)
                    .iter()
                    .map(|&c| self.node_tree(c))
                    .collect(),
            },
            NodeKind::Text(text) => NodeTree::Text { text: text.clone() },
            NodeKind::Comment(text) => NodeTree::Comment { text: text.clone() },
        }
    }

    /// Insert a subtree under `parent` and return the new node.
    pub fn append_tree(&mut self, parent: NodeId, node: NodeTree) -> NodeId {
        let id = match node {
            NodeTree::Element {
                tag,
                attributes,
                children,
            } => {
                let id = self.create_element(&tag);
                copy_attributes(self, id, attributes);
                for child in children {
                    self.append_tree(id, child);
                }
                id
            }
            NodeTree::Text { text } => self.create_text(&text),
            NodeTree::Comment { text } => self.create_comment(&text),
        };
        self.append_child(parent, id);
        id
    }
}

fn copy_attributes(doc: &mut Document, id: NodeId, attributes: Vec<Attribute>) {
    for attr in attributes {
        // First occurrence wins, like an HTML parser.
        if !doc.has_attribute(id, &attr.name) {
            doc.set_attribute(id, &attr.name, attr.value);
        }
    }
}

fn place_top_level(doc: &mut Document, node: NodeTree, head: NodeId, body: NodeId) {
    if node.is_blank_text() {
        return;
    }
    match node {
        NodeTree::Element {
            tag,
            attributes,
            children,
        } if tag == "head" || tag == "body" => {
            let target = if tag == "head" { head } else { body };
            copy_attributes(doc, target, attributes);
            for child in children {
                doc.append_tree(target, child);
            }
        }
        other => {
            doc.append_tree(body, other);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn element(tag: &str, children: Vec<NodeTree>) -> NodeTree {
        NodeTree::Element {
            tag: tag.to_string(),
            attributes: Vec::new(),
            children,
        }
    }

    #[test]
    fn test_from_tree_locates_head_and_body() {
        let tree = DocumentTree {
            doctype: Some("html".into()),
            children: vec![element(
                "html",
                vec![
                    element("head", vec![element("title", vec![])]),
                    NodeTree::Text { text: "\n".into() },
                    element("body", vec![element("p", vec![])]),
                ],
            )],
        };
        let doc = Document::from_tree(tree);
        assert_eq!(doc.children(doc.root()).len(), 2);
        assert_eq!(doc.element_children(doc.head()).len(), 1);
        assert!(doc.is_tag(doc.element_children(doc.body())[0], "p"));
    }

    #[test]
    fn test_from_tree_wraps_bare_content_in_body() {
        let tree = DocumentTree {
            doctype: None,
            children: vec![element("amp-img", vec![])],
        };
        let doc = Document::from_tree(tree);
        assert!(doc.is_tag(doc.element_children(doc.body())[0], "amp-img"));
        assert_eq!(doc.doctype(), None);
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{
            "doctype": "html",
            "children": [
                {"type": "element", "tag": "html", "attributes": [{"name": "amp", "value": ""}],
                 "children": [
                    {"type": "element", "tag": "head", "children": [
                        {"type": "element", "tag": "style",
                         "attributes": [{"name": "amp-custom"}],
                         "children": [{"type": "text", "text": "p{}"}]}
                    ]},
                    {"type": "element", "tag": "body", "children": [
                        {"type": "comment", "text": "hi"}
                    ]}
                 ]}
            ]
        }"#;
        let doc = Document::from_json(json).unwrap();
        assert!(doc.has_attribute(doc.root(), "amp"));
        assert_eq!(doc.css_budget().used(), 3);

        let again = Document::from_tree(doc.to_tree());
        assert_eq!(again.to_tree(), doc.to_tree());
    }

    #[test]
    fn test_from_json_reports_position() {
        let err = Document::from_json("{\n  \"children\": [").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
