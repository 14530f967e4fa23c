//! The document façade.
//!
//! Owns the node arena, the `<html>`/`<head>`/`<body>` handles, the custom CSS
//! budget and the generator for element ids. Every structural mutation goes
//! through here so parent and child links always agree.

use crate::budget::{CssByteBudget, MAX_CUSTOM_CSS_BYTES};
use crate::node::{is_amp_element, Attribute, ElementData, NodeData, NodeId, NodeKind};

/// Prefix for element ids generated for CSS targeting.
pub const GENERATED_ID_PREFIX: &str = "i-amp-";

/// A parsed AMP document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    doctype: Option<String>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    css_budget: CssByteBudget,
    next_generated_id: usize,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty `<!doctype html><html><head></head><body></body></html>` document.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            doctype: Some("html".to_string()),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            css_budget: CssByteBudget::default(),
            next_generated_id: 0,
        };
        let root = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.append_child(root, head);
        doc.append_child(root, body);
        doc.root = root;
        doc.head = head;
        doc.body = body;
        doc
    }

    // =========================================================================
    // Well-known nodes
    // =========================================================================

    /// The `<html>` element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn doctype(&self) -> Option<&str> {
        self.doctype.as_deref()
    }

    pub fn set_doctype(&mut self, doctype: Option<String>) {
        self.doctype = doctype;
    }

    // =========================================================================
    // CSS budget
    // =========================================================================

    pub fn css_budget(&self) -> &CssByteBudget {
        &self.css_budget
    }

    pub fn css_budget_mut(&mut self) -> &mut CssByteBudget {
        &mut self.css_budget
    }

    /// Reset the budget to the bytes currently held by `<style amp-custom>`.
    pub fn recount_css_budget(&mut self) {
        let used = self
            .amp_custom_style()
            .map(|style| self.text_content(style).len())
            .unwrap_or(0);
        self.css_budget = CssByteBudget::with_used(MAX_CUSTOM_CSS_BYTES, used);
    }

    /// The `<style amp-custom>` element in `<head>`, if any.
    pub fn amp_custom_style(&self) -> Option<NodeId> {
        self.element_children(self.head).into_iter().find(|&id| {
            self.is_tag(id, "style") && self.has_attribute(id, "amp-custom")
        })
    }

    /// Append CSS to `<style amp-custom>`, creating the element when missing.
    ///
    /// Does not touch the budget; callers allocate before appending.
    pub fn append_custom_css(&mut self, css: &str) {
        let style = match self.amp_custom_style() {
            Some(style) => style,
            None => {
                let style = self.create_element_with_attributes("style", &[("amp-custom", "")]);
                let head = self.head;
                self.append_child(head, style);
                style
            }
        };
        let mut text = self.text_content(style);
        text.push_str(css);
        self.set_text_content(style, &text);
    }

    // =========================================================================
    // Node access
    // =========================================================================

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag_name(id) == Some(tag)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attribute(name))
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_attribute(name))
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        self.element(id)
            .map(|el| el.attributes.as_slice())
            .unwrap_or(&[])
    }

    /// No-op on non-element nodes.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(el) = self.element_mut(id) {
            el.set_attribute(name, value);
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id).and_then(|el| el.remove_attribute(name))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
            .collect()
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        if let NodeKind::Text(text) = &self.nodes[id.0].kind {
            return text.clone();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|d| match &self.nodes[d.0].kind {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children with a single text node (none when `text` is empty).
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        for child in self.children(id).to_vec() {
            self.detach(child);
        }
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
    }

    /// Overwrite the string held by a text or comment node.
    pub fn set_node_text(&mut self, id: NodeId, text: impl Into<String>) {
        match &mut self.nodes[id.0].kind {
            NodeKind::Text(t) | NodeKind::Comment(t) => *t = text.into(),
            NodeKind::Element(_) => {}
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(kind));
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData::new(tag)))
    }

    pub fn create_element_with_attributes(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut el = ElementData::new(tag);
        for (name, value) in attrs {
            el.set_attribute(name, *value);
        }
        self.push(NodeKind::Element(el))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment(text.to_string()))
    }

    /// Detached copy of a node without its children.
    pub fn clone_shallow(&mut self, id: NodeId) -> NodeId {
        let kind = self.nodes[id.0].kind.clone();
        self.push(kind)
    }

    // =========================================================================
    // Structural mutation
    // =========================================================================

    /// Remove a node from its parent. The node and its subtree stay valid and
    /// may be reinserted.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_at(parent, child, usize::MAX);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_at(parent, child, 0);
    }

    /// Insert `child` before `reference`; appends when `reference` is `None` or
    /// not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.detach(child);
        let index = reference
            .and_then(|r| self.nodes[parent.0].children.iter().position(|&c| c == r))
            .unwrap_or(usize::MAX);
        self.insert_at(parent, child, index);
    }

    /// Insert `child` right after `reference`; appends when `reference` is not a
    /// child of `parent`.
    pub fn insert_after(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.detach(child);
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == reference)
            .map(|i| i + 1)
            .unwrap_or(usize::MAX);
        self.insert_at(parent, child, index);
    }

    fn insert_at(&mut self, parent: NodeId, child: NodeId, index: usize) {
        debug_assert_ne!(parent, child, "a node cannot contain itself");
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Put `new` where `old` is and detach `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        let Some(parent) = self.parent(old) else {
            return;
        };
        self.insert_before(parent, new, Some(old));
        self.detach(old);
    }

    /// Move every child of `from` to the end of `to`, keeping their order.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let children = std::mem::take(&mut self.nodes[from.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
            self.append_child(to, child);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// All nodes below `scope` in document order, `scope` excluded.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Elements below `scope` matching `pred`, in document order.
    pub fn find_all(&self, scope: NodeId, pred: impl Fn(&ElementData) -> bool) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&id| self.element(id).is_some_and(&pred))
            .collect()
    }

    pub fn find_first(&self, scope: NodeId, pred: impl Fn(&ElementData) -> bool) -> Option<NodeId> {
        self.find_all(scope, pred).into_iter().next()
    }

    pub fn elements_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.find_all(scope, |el| el.tag == tag)
    }

    /// Every AMP custom element currently in the tree, in document order.
    pub fn amp_elements(&self) -> Vec<NodeId> {
        self.find_all(self.root, |el| is_amp_element(&el.tag))
    }

    pub fn has_ancestor(&self, id: NodeId, tag: &str) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if self.is_tag(node, tag) {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Whether the node is reachable from the root element.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    // =========================================================================
    // Element ids
    // =========================================================================

    /// The element's `id`, generating a unique `i-amp-N` one when missing.
    pub fn element_id(&mut self, id: NodeId) -> String {
        if let Some(existing) = self.attribute(id, "id").filter(|v| !v.is_empty()) {
            return existing.to_string();
        }
        loop {
            let candidate = format!("{GENERATED_ID_PREFIX}{}", self.next_generated_id);
            self.next_generated_id += 1;
            if !self.id_in_use(&candidate) {
                self.set_attribute(id, "id", candidate.clone());
                return candidate;
            }
        }
    }

    fn id_in_use(&self, value: &str) -> bool {
        self.nodes
            .iter()
            .any(|n| matches!(&n.kind, NodeKind::Element(el) if el.attribute("id") == Some(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tags(doc: &Document, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .filter_map(|&id| doc.tag_name(id).map(str::to_string))
            .collect()
    }

    // =========================================================================
    // Structure
    // =========================================================================

    #[test]
    fn test_new_document_shape() {
        let doc = Document::new();
        assert_eq!(tags(&doc, doc.children(doc.root())), vec!["head", "body"]);
        assert_eq!(doc.parent(doc.head()), Some(doc.root()));
        assert_eq!(doc.doctype(), Some("html"));
    }

    #[test]
    fn test_append_moves_existing_child() {
        let mut doc = Document::new();
        let body = doc.body();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(body, a);
        doc.append_child(body, b);
        doc.append_child(body, a);
        assert_eq!(tags(&doc, doc.children(body)), vec!["b", "a"]);
    }

    #[test]
    fn test_insert_before_and_after() {
        let mut doc = Document::new();
        let head = doc.head();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        let c = doc.create_element("c");
        doc.append_child(head, a);
        doc.insert_before(head, b, Some(a));
        doc.insert_after(head, c, b);
        assert_eq!(tags(&doc, doc.children(head)), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_replace_transplants_position() {
        let mut doc = Document::new();
        let body = doc.body();
        let first = doc.create_element("p");
        let old = doc.create_element("amp-img");
        let last = doc.create_element("p");
        doc.append_child(body, first);
        doc.append_child(body, old);
        doc.append_child(body, last);
        let child = doc.create_text("x");
        doc.append_child(old, child);

        let new = doc.clone_shallow(old);
        doc.move_children(old, new);
        doc.replace(old, new);

        assert_eq!(doc.children(body), &[first, new, last]);
        assert_eq!(doc.parent(old), None);
        assert_eq!(doc.children(new), &[child]);
        assert_eq!(doc.parent(child), Some(new));
    }

    #[test]
    fn test_detached_nodes_leave_no_dangling_links() {
        let mut doc = Document::new();
        let body = doc.body();
        let p = doc.create_element("p");
        doc.append_child(body, p);
        doc.detach(p);
        assert!(doc.children(body).is_empty());
        assert!(!doc.is_attached(p));
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[test]
    fn test_descendants_document_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let div = doc.create_element("div");
        let img = doc.create_element("amp-img");
        let span = doc.create_element("span");
        doc.append_child(body, div);
        doc.append_child(div, img);
        doc.append_child(body, span);
        assert_eq!(doc.descendants(body), vec![div, img, span]);
        assert_eq!(doc.amp_elements(), vec![img]);
        assert!(doc.has_ancestor(img, "div"));
        assert!(!doc.has_ancestor(span, "div"));
    }

    #[test]
    fn test_text_content_round_trip() {
        let mut doc = Document::new();
        let style = doc.create_element("style");
        doc.set_text_content(style, "a{}");
        assert_eq!(doc.text_content(style), "a{}");
        doc.set_text_content(style, "");
        assert!(doc.children(style).is_empty());
    }

    // =========================================================================
    // Element ids and custom CSS
    // =========================================================================

    #[test]
    fn test_element_id_generated_once() {
        let mut doc = Document::new();
        let body = doc.body();
        let el = doc.create_element("amp-img");
        doc.append_child(body, el);
        let id = doc.element_id(el);
        assert_eq!(id, "i-amp-0");
        assert_eq!(doc.element_id(el), "i-amp-0");
    }

    #[test]
    fn test_element_id_skips_taken_values() {
        let mut doc = Document::new();
        let body = doc.body();
        let taken = doc.create_element_with_attributes("div", &[("id", "i-amp-0")]);
        let el = doc.create_element("amp-img");
        doc.append_child(body, taken);
        doc.append_child(body, el);
        assert_eq!(doc.element_id(el), "i-amp-1");
    }

    #[test]
    fn test_element_id_keeps_authored_id() {
        let mut doc = Document::new();
        let el = doc.create_element_with_attributes("amp-img", &[("id", "hero")]);
        assert_eq!(doc.element_id(el), "hero");
    }

    #[test]
    fn test_append_custom_css_creates_style() {
        let mut doc = Document::new();
        assert_eq!(doc.amp_custom_style(), None);
        doc.append_custom_css("a{b:c}");
        doc.append_custom_css("d{e:f}");
        let style = doc.amp_custom_style().unwrap();
        assert_eq!(doc.text_content(style), "a{b:c}d{e:f}");
    }

    #[test]
    fn test_recount_css_budget() {
        let mut doc = Document::new();
        doc.append_custom_css("0123456789");
        doc.recount_css_budget();
        assert_eq!(doc.css_budget().used(), 10);
        assert_eq!(doc.css_budget().remaining(), MAX_CUSTOM_CSS_BYTES - 10);
    }
}
