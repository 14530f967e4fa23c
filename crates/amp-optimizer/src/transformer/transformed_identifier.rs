use amp_dom::Document;

use crate::amp::{TRANSFORMED_ATTRIBUTE, TRANSFORMED_VALUE};
use crate::error::ErrorCollection;
use crate::{OptimizerError, Transformer};

/// Marks the root element as optimized by this tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformedIdentifier;

impl TransformedIdentifier {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for TransformedIdentifier {
    fn name(&self) -> &'static str {
        "TransformedIdentifier"
    }

    #[tracing::instrument(name = "TransformedIdentifier", skip_all)]
    fn transform(&self, doc: &mut Document, _errors: &mut ErrorCollection) -> Result<(), OptimizerError> {
        let root = doc.root();
        doc.set_attribute(root, TRANSFORMED_ATTRIBUTE, TRANSFORMED_VALUE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_marks_root() {
        let mut doc = Document::new();
        TransformedIdentifier::new()
            .transform(&mut doc, &mut ErrorCollection::new())
            .unwrap();
        assert_eq!(doc.attribute(doc.root(), "transformed"), Some("self;v=1"));
    }
}
