//! HTML serializer.
//!
//! Emits markup without added whitespace so the output reflects exactly the
//! nodes in the tree.

use crate::document::Document;
use crate::node::{is_raw_text_element, is_void_element, NodeId, NodeKind};

impl Document {
    /// Serialize the attached document, doctype included.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if let Some(doctype) = self.doctype() {
            out.push_str(&format!("<!doctype {doctype}>"));
        }
        self.write_node(self.root(), false, &mut out);
        out
    }

    /// Serialize a single node and its subtree.
    pub fn node_to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self
            .parent(id)
            .and_then(|p| self.tag_name(p))
            .is_some_and(is_raw_text_element);
        self.write_node(id, raw, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, raw_text: bool, out: &mut String) {
        match self.kind(id) {
            NodeKind::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_text(text));
                }
            }
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for attr in &el.attributes {
                    out.push(' ');
                    out.push_str(&attr.name);
                    if !attr.value.is_empty() {
                        out.push_str(&format!("=\"{}\"", escape_attribute(&attr.value)));
                    }
                }
                out.push('>');

                if is_void_element(&el.tag) {
                    return;
                }

                let raw_children = is_raw_text_element(&el.tag);
                for &child in self.children(id) {
                    self.write_node(child, raw_children, out);
                }
                out.push_str(&format!("</{}>", el.tag));
            }
        }
    }
}

/// Escape `&`, `<` and `>` in text content.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape `&` and `"` in a double-quoted attribute value.
pub fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
