//! Node storage for the document arena.
//!
//! Nodes never own each other directly. A node refers to its children and its
//! parent through [`NodeId`] handles into the owning [`crate::Document`].

use serde::{Deserialize, Serialize};

/// Handle to a node stored in a [`crate::Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the arena. Stable for the lifetime of the document.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A single `name="value"` pair. Boolean attributes carry an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Tag name plus ordered, uniquely named attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub tag: String,
    pub attributes: Vec<Attribute>,
}

impl ElementData {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Set an attribute, keeping its position when it already exists.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute::new(name, value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(pos).value)
    }

    /// Rename an attribute in place, preserving its value and position.
    /// Returns `false` when `from` is absent or `to` already exists.
    pub fn rename_attribute(&mut self, from: &str, to: &str) -> bool {
        if self.has_attribute(to) {
            return false;
        }
        match self.attributes.iter_mut().find(|a| a.name == from) {
            Some(attr) => {
                attr.name = to.to_string();
                true
            }
            None => false,
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    /// Append a class to the `class` attribute unless already present.
    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let classes = match self.attribute("class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attribute("class", classes);
    }

    /// Space-separated tokens of an attribute such as `rel`, lowercased.
    pub fn attribute_tokens(&self, name: &str) -> Vec<String> {
        self.attribute(name)
            .map(|v| {
                v.split_ascii_whitespace()
                    .map(|t| t.to_ascii_lowercase())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// What a node holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// HTML void elements (no children, no end tag).
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Check if a tag name is an HTML void element.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Elements whose text content is emitted without escaping.
pub fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

/// AMP custom elements are the `amp-*` tags outside the standard HTML vocabulary.
pub fn is_amp_element(tag: &str) -> bool {
    tag.starts_with("amp-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_attribute_keeps_position() {
        let mut el = ElementData::new("amp-img");
        el.set_attribute("width", "10");
        el.set_attribute("height", "20");
        el.set_attribute("width", "30");
        let names: Vec<&str> = el.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["width", "height"]);
        assert_eq!(el.attribute("width"), Some("30"));
    }

    #[test]
    fn test_add_class_deduplicates() {
        let mut el = ElementData::new("div");
        el.add_class("a");
        el.add_class("b");
        el.add_class("a");
        assert_eq!(el.attribute("class"), Some("a b"));
    }

    #[test]
    fn test_add_class_to_blank_attribute() {
        let mut el = ElementData::new("div");
        el.set_attribute("class", "  ");
        el.add_class("a");
        assert_eq!(el.attribute("class"), Some("a"));
    }

    #[test]
    fn test_rename_attribute() {
        let mut el = ElementData::new("p");
        el.set_attribute("bind-text", "foo");
        assert!(el.rename_attribute("bind-text", "data-amp-bind-text"));
        assert_eq!(el.attribute("data-amp-bind-text"), Some("foo"));
        assert!(!el.has_attribute("bind-text"));
    }

    #[test]
    fn test_attribute_tokens_lowercased() {
        let mut el = ElementData::new("link");
        el.set_attribute("rel", "Shortcut  ICON");
        assert_eq!(el.attribute_tokens("rel"), vec!["shortcut", "icon"]);
    }

    #[test]
    fn test_amp_element_detection() {
        assert!(is_amp_element("amp-img"));
        assert!(!is_amp_element("img"));
        assert!(!is_amp_element("i-amphtml-sizer"));
    }
}
