//! AMP document tree
//!
//! An arena-backed DOM with the operations the optimizer passes need: element
//! and attribute access, structural mutation that keeps parent and child links
//! balanced, document-order queries, generated element ids for CSS targeting and
//! the shared custom CSS byte budget.
//!
//! ```
//! use amp_dom::Document;
//!
//! let mut doc = Document::new();
//! let body = doc.body();
//! let img = doc.create_element_with_attributes("amp-img", &[("width", "10")]);
//! doc.append_child(body, img);
//! assert_eq!(doc.amp_elements(), vec![img]);
//! ```

pub mod budget;
pub mod document;
#[cfg(any(test, feature = "fixture"))]
pub mod fixture;
pub mod node;
pub mod serialize;
pub mod tree;

pub use budget::{CssByteBudget, MAX_CUSTOM_CSS_BYTES};
pub use document::Document;
pub use node::{Attribute, ElementData, NodeId, NodeKind};
pub use tree::{DocumentTree, NodeTree};

/// Error raised while loading a document, with position information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Document error at line {line}, column {column}: {message}")]
pub struct DocumentError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}
