//! Markup minification.

use amp_dom::{Document, NodeId, NodeKind};
use tracing::debug;

use crate::config::MinifyHtmlConfig;
use crate::error::ErrorCollection;
use crate::{OptimizerError, Transformer};

/// Content inside these elements is left byte-for-byte intact.
const PRESERVED_ELEMENTS: &[&str] = &["pre", "textarea", "script", "style"];

#[derive(Debug, Clone, Default)]
pub struct MinifyHtml {
    config: MinifyHtmlConfig,
}

impl MinifyHtml {
    pub fn new(config: MinifyHtmlConfig) -> Self {
        Self { config }
    }
}

fn is_preserved(doc: &Document, id: NodeId) -> bool {
    PRESERVED_ELEMENTS.iter().any(|tag| doc.has_ancestor(id, tag))
}

/// Collapse every run of ASCII whitespace to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

impl Transformer for MinifyHtml {
    fn name(&self) -> &'static str {
        "MinifyHtml"
    }

    #[tracing::instrument(name = "MinifyHtml", skip_all)]
    fn transform(&self, doc: &mut Document, _errors: &mut ErrorCollection) -> Result<(), OptimizerError> {
        let head = doc.head();
        let mut removed = 0usize;
        for id in doc.descendants(doc.root()) {
            if is_preserved(doc, id) {
                continue;
            }
            let collapsed = match doc.kind(id) {
                NodeKind::Comment(_) if self.config.remove_comments => None,
                NodeKind::Text(text) if self.config.collapse_whitespace => {
                    if text.trim().is_empty() && doc.parent(id) == Some(head) {
                        None
                    } else {
                        Some(collapse_whitespace(text))
                    }
                }
                _ => continue,
            };
            match collapsed {
                Some(text) => doc.set_node_text(id, text),
                None => {
                    doc.detach(id);
                    removed += 1;
                }
            }
        }
        debug!(removed, "minified markup");
        Ok(())
    }
}
