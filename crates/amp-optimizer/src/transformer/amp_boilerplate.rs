//! Boilerplate reinsertion.
//!
//! Documents that still rely on the runtime to reveal content need the
//! canonical `<style amp-boilerplate>` and `<noscript>` pair in `<head>`.

use amp_dom::{Document, NodeId};
use tracing::debug;

use crate::amp::{is_boilerplate_style, BOILERPLATE_CSS, NOSCRIPT_BOILERPLATE_CSS, NO_BOILERPLATE_ATTRIBUTE};
use crate::error::ErrorCollection;
use crate::{OptimizerError, Transformer};

/// Formats that carry their own boilerplate.
const OTHER_FORMAT_ATTRIBUTES: &[&str] = &["amp4email", "⚡4email", "amp4ads", "⚡4ads"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AmpBoilerplate;

impl AmpBoilerplate {
    pub fn new() -> Self {
        Self
    }
}

fn boilerplate_nodes(doc: &Document, head: NodeId) -> (Vec<NodeId>, Vec<NodeId>) {
    let mut styles = Vec::new();
    let mut noscripts = Vec::new();
    for child in doc.element_children(head) {
        if doc.element(child).is_some_and(is_boilerplate_style) {
            styles.push(child);
        } else if doc.is_tag(child, "noscript")
            && doc
                .element_children(child)
                .into_iter()
                .any(|c| doc.element(c).is_some_and(is_boilerplate_style))
        {
            noscripts.push(child);
        }
    }
    (styles, noscripts)
}

impl Transformer for AmpBoilerplate {
    fn name(&self) -> &'static str {
        "AmpBoilerplate"
    }

    #[tracing::instrument(name = "AmpBoilerplate", skip_all)]
    fn transform(&self, doc: &mut Document, _errors: &mut ErrorCollection) -> Result<(), OptimizerError> {
        let root = doc.root();
        if doc.has_attribute(root, NO_BOILERPLATE_ATTRIBUTE)
            || OTHER_FORMAT_ATTRIBUTES.iter().any(|a| doc.has_attribute(root, a))
        {
            return Ok(());
        }

        let head = doc.head();
        let (styles, noscripts) = boilerplate_nodes(doc, head);
        if styles.len() == 1 && noscripts.len() == 1 {
            return Ok(());
        }

        // Incomplete or duplicated: start over with a single canonical pair.
        for node in styles.into_iter().chain(noscripts) {
            doc.detach(node);
        }
        let style = doc.create_element_with_attributes("style", &[("amp-boilerplate", "")]);
        doc.set_text_content(style, BOILERPLATE_CSS);
        let noscript = doc.create_element("noscript");
        let noscript_style = doc.create_element_with_attributes("style", &[("amp-boilerplate", "")]);
        doc.set_text_content(noscript_style, NOSCRIPT_BOILERPLATE_CSS);
        doc.append_child(noscript, noscript_style);
        doc.append_child(head, style);
        doc.append_child(head, noscript);
        debug!("inserted boilerplate");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp_dom::fixture::parse_document;
    use pretty_assertions::assert_eq;

    fn run(html: &str) -> Document {
        let mut doc = parse_document(html).unwrap();
        AmpBoilerplate::new()
            .transform(&mut doc, &mut ErrorCollection::new())
            .unwrap();
        doc
    }

    #[test]
    fn test_inserts_missing_pair() {
        let doc = run("<html amp><head><meta charset=utf-8></head><body></body></html>");
        let head = doc.head();
        let (styles, noscripts) = boilerplate_nodes(&doc, head);
        assert_eq!(styles.len(), 1);
        assert_eq!(noscripts.len(), 1);
        assert_eq!(doc.text_content(styles[0]), BOILERPLATE_CSS);
        assert_eq!(doc.text_content(noscripts[0]), NOSCRIPT_BOILERPLATE_CSS);
    }

    #[test]
    fn test_complete_pair_untouched() {
        let html = "<html amp><head><style amp-boilerplate>a</style><noscript><style amp-boilerplate>b</style></noscript></head><body></body></html>";
        let doc = run(html);
        assert_eq!(doc.to_html(), parse_document(html).unwrap().to_html());
    }

    #[test]
    fn test_partial_pair_replaced() {
        let doc = run("<html amp><head><style amp-boilerplate>stale</style></head><body></body></html>");
        let (styles, noscripts) = boilerplate_nodes(&doc, doc.head());
        assert_eq!(styles.len(), 1);
        assert_eq!(noscripts.len(), 1);
        assert_eq!(doc.text_content(styles[0]), BOILERPLATE_CSS);
    }

    #[test]
    fn test_skipped_when_boilerplate_removed() {
        let doc = run("<html amp i-amphtml-no-boilerplate><head></head><body></body></html>");
        assert!(doc.element_children(doc.head()).is_empty());
    }

    #[test]
    fn test_skipped_for_email() {
        let doc = run("<html amp4email><head></head><body></body></html>");
        assert!(doc.element_children(doc.head()).is_empty());
    }
}
