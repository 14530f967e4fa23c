//! AMP Optimizer
//!
//! Rewrites an AMP document into a faster-rendering equivalent by running a
//! fixed sequence of transformers over one [`Document`]. Each pass mutates the
//! tree in place and records non-fatal problems in an [`ErrorCollection`].
//!
//! ```text
//! Document ──► AmpBoilerplate ─► MetaViewport ─► AutoExtensions ─► ServerSideRendering
//!          ──► AmpRuntimeCss ─► PreloadHeroImage ─► RewriteAmpUrls ─► TransformedIdentifier
//!          ──► ReorderHead ─► MinifyHtml
//! ```
//!
//! Only contradictory configuration aborts a run ([`OptimizerError`]); every
//! other failure downgrades the affected optimization and is reported through
//! the collection.

pub mod amp;
pub mod config;
pub mod css;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod spec;
pub mod transformer;
pub mod transport;

use std::sync::Arc;

use amp_dom::Document;

pub use config::Configuration;
pub use error::{Error, ErrorCollection, ErrorKind};
pub use pipeline::Pipeline;
pub use spec::ValidatorSpec;
pub use transport::{RemoteGetRequest, Response, StubbedRemoteGetRequest, TransportError};

/// Hard error that aborts a run.
#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid validator spec: {0}")]
    Spec(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl OptimizerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        OptimizerError::InvalidConfiguration(message.into())
    }

    pub fn spec(message: impl Into<String>) -> Self {
        OptimizerError::Spec(message.into())
    }
}

/// One optimization pass.
///
/// Implementations hold only their configuration and collaborators, never
/// per-document state, so a single instance can be reused across runs.
pub trait Transformer: Send + Sync {
    /// Name used in configuration and logs.
    fn name(&self) -> &'static str;

    fn transform(&self, doc: &mut Document, errors: &mut ErrorCollection)
        -> Result<(), OptimizerError>;
}

/// Optimize a document with the default pipeline and no network access.
///
/// Runtime CSS inlining falls back to a stylesheet link, since the stubbed
/// transport answers every request with an error.
pub fn optimize(
    doc: &mut Document,
    config: &Configuration,
    spec: Arc<ValidatorSpec>,
) -> Result<ErrorCollection, OptimizerError> {
    let pipeline = Pipeline::from_configuration(config, spec, Arc::new(StubbedRemoteGetRequest::new()))?;
    let mut errors = ErrorCollection::new();
    pipeline.run(doc, &mut errors)?;
    Ok(errors)
}
