//! Viewport normalization.
//!
//! Folds every `<meta name=viewport>` into the first one so the head carries
//! exactly one, and adds a default when the document has none.

use amp_dom::{Document, NodeId};
use tracing::debug;

use crate::error::ErrorCollection;
use crate::{OptimizerError, Transformer};

const DEFAULT_VIEWPORT: &str = "width=device-width";

#[derive(Debug, Clone, Copy, Default)]
pub struct MetaViewport;

impl MetaViewport {
    pub fn new() -> Self {
        Self
    }
}

fn is_viewport(doc: &Document, id: NodeId) -> bool {
    doc.is_tag(id, "meta")
        && doc
            .attribute(id, "name")
            .is_some_and(|n| n.eq_ignore_ascii_case("viewport"))
}

/// Merge `key=value` lists. Later values win, keys keep the position of their
/// first appearance.
pub fn merge_viewport_content<'a>(contents: impl IntoIterator<Item = &'a str>) -> String {
    let mut properties: Vec<(String, String)> = Vec::new();
    for content in contents {
        for part in content.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, value) = match part.split_once('=') {
                Some((k, v)) => (k.trim().to_ascii_lowercase(), v.trim().to_string()),
                None => (part.to_ascii_lowercase(), String::new()),
            };
            match properties.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => properties.push((key, value)),
            }
        }
    }
    properties
        .into_iter()
        .map(|(k, v)| if v.is_empty() { k } else { format!("{k}={v}") })
        .collect::<Vec<_>>()
        .join(",")
}

impl Transformer for MetaViewport {
    fn name(&self) -> &'static str {
        "MetaViewport"
    }

    #[tracing::instrument(name = "MetaViewport", skip_all)]
    fn transform(&self, doc: &mut Document, _errors: &mut ErrorCollection) -> Result<(), OptimizerError> {
        let head = doc.head();
        let viewports: Vec<NodeId> = doc
            .descendants(head)
            .into_iter()
            .filter(|&id| is_viewport(doc, id))
            .collect();

        let Some((&first, rest)) = viewports.split_first() else {
            let meta = doc.create_element_with_attributes(
                "meta",
                &[("name", "viewport"), ("content", DEFAULT_VIEWPORT)],
            );
            let charset = doc
                .element_children(head)
                .into_iter()
                .find(|&c| doc.is_tag(c, "meta") && doc.has_attribute(c, "charset"));
            match charset {
                Some(charset) => doc.insert_after(head, meta, charset),
                None => doc.prepend_child(head, meta),
            }
            debug!("added default viewport");
            return Ok(());
        };

        if rest.is_empty() {
            return Ok(());
        }
        let merged = merge_viewport_content(
            viewports
                .iter()
                .map(|&id| doc.attribute(id, "content").unwrap_or_default()),
        );
        doc.set_attribute(first, "content", merged);
        for &extra in rest {
            doc.detach(extra);
        }
        debug!(merged = rest.len(), "merged viewport declarations");
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
        MetaViewport::new()
            .transform(&mut doc, &mut ErrorCollection::new())
            .unwrap();
        doc
    }

    fn viewports(doc: &Document) -> Vec<String> {
        doc.descendants(doc.head())
            .into_iter()
            .filter(|&id| is_viewport(doc, id))
            .map(|id| doc.attribute(id, "content").unwrap_or_default().to_string())
            .collect()
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn test_merge_later_values_win() {
        assert_eq!(
            merge_viewport_content(["width=device-width, initial-scale=1", "initial-scale=2,user-scalable=no"]),
            "width=device-width,initial-scale=2,user-scalable=no"
        );
    }

    #[test]
    fn test_merge_ignores_empty_parts() {
        assert_eq!(merge_viewport_content([" width = 100 ,, "]), "width=100");
    }

    #[test]
    fn test_duplicates_collapsed_into_first() {
        let doc = run(
            r#"<html><head><meta name="viewport" content="width=device-width"><title>t</title><meta name="viewport" content="minimum-scale=1"></head><body></body></html>"#,
        );
        assert_eq!(viewports(&doc), vec!["width=device-width,minimum-scale=1"]);
        let first = doc.element_children(doc.head())[0];
        assert!(is_viewport(&doc, first));
    }

    #[test]
    fn test_single_viewport_untouched() {
        let doc = run(r#"<html><head><meta name="viewport" content="width=device-width, initial-scale=1"></head><body></body></html>"#);
        assert_eq!(viewports(&doc), vec!["width=device-width, initial-scale=1"]);
    }

    // =========================================================================
    // Default insertion
    // =========================================================================

    #[test]
    fn test_default_inserted_after_charset() {
        let doc = run(r#"<html><head><title>t</title><meta charset="utf-8"></head><body></body></html>"#);
        let children = doc.element_children(doc.head());
        assert!(doc.is_tag(children[1], "meta"));
        assert!(doc.has_attribute(children[1], "charset"));
        assert!(is_viewport(&doc, children[2]));
        assert_eq!(viewports(&doc), vec![DEFAULT_VIEWPORT]);
    }

    #[test]
    fn test_default_prepended_without_charset() {
        let doc = run("<html><head><title>t</title></head><body></body></html>");
        let first = doc.element_children(doc.head())[0];
        assert!(is_viewport(&doc, first));
    }
}
