//! Transformer pipeline.
//!
//! Builds the ordered list of passes from a [`Configuration`] and runs them
//! over a document. The order matters: layout rendering must see every
//! extension script, and head reordering must see everything the earlier
//! passes inserted.

use std::sync::Arc;

use amp_dom::Document;
use tracing::info;

use crate::config::Configuration;
use crate::error::{Error, ErrorCollection};
use crate::spec::ValidatorSpec;
use crate::transformer::{
    AmpBoilerplate, AmpRuntimeCss, AutoExtensions, MetaViewport, MinifyHtml, PreloadHeroImage,
    ReorderHead, RewriteAmpUrls, ServerSideRendering, TransformedIdentifier,
};
use crate::transport::RemoteGetRequest;
use crate::{OptimizerError, Transformer};

/// Passes that no longer exist; naming one is reported, not fatal.
const DEPRECATED_TRANSFORMERS: &[&str] = &["GoogleFontsPreconnect"];

pub struct Pipeline {
    transformers: Vec<Box<dyn Transformer>>,
    deprecated: Vec<String>,
}

impl Pipeline {
    /// Pass names in the order used when the configuration lists none.
    pub fn default_order(config: &Configuration) -> Vec<&'static str> {
        let mut names = vec![
            "AmpBoilerplate",
            "MetaViewport",
            "AutoExtensions",
            "ServerSideRendering",
            "AmpRuntimeCss",
            "PreloadHeroImage",
        ];
        if config.rewrite_amp_urls.is_active() {
            names.push("RewriteAmpUrls");
        }
        names.push("TransformedIdentifier");
        names.push("ReorderHead");
        if config.minify_html.enabled {
            names.push("MinifyHtml");
        }
        names
    }

    pub fn from_configuration(
        config: &Configuration,
        spec: Arc<ValidatorSpec>,
        transport: Arc<dyn RemoteGetRequest>,
    ) -> Result<Self, OptimizerError> {
        let names: Vec<String> = match &config.transformers {
            Some(names) => names.clone(),
            None => Self::default_order(config).into_iter().map(str::to_string).collect(),
        };

        let mut transformers: Vec<Box<dyn Transformer>> = Vec::with_capacity(names.len());
        let mut deprecated = Vec::new();
        for name in names {
            let transformer: Box<dyn Transformer> = match name.as_str() {
                "AmpBoilerplate" => Box::new(AmpBoilerplate::new()),
                "MetaViewport" => Box::new(MetaViewport::new()),
                "AutoExtensions" => Box::new(AutoExtensions::new(
                    config.auto_extensions.clone(),
                    Arc::clone(&spec),
                )),
                "ServerSideRendering" => {
                    Box::new(ServerSideRendering::new(config.server_side_rendering.clone()))
                }
                "AmpRuntimeCss" => Box::new(AmpRuntimeCss::new(
                    config.amp_runtime_css.clone(),
                    Arc::clone(&transport),
                )),
                "PreloadHeroImage" => {
                    Box::new(PreloadHeroImage::new(config.preload_hero_image.clone()))
                }
                "RewriteAmpUrls" => Box::new(RewriteAmpUrls::new(config.rewrite_amp_urls.clone())),
                "TransformedIdentifier" => Box::new(TransformedIdentifier::new()),
                "ReorderHead" => Box::new(ReorderHead::new()),
                "MinifyHtml" => Box::new(MinifyHtml::new(config.minify_html.clone())),
                other if DEPRECATED_TRANSFORMERS.contains(&other) => {
                    deprecated.push(other.to_string());
                    continue;
                }
                other => {
                    return Err(OptimizerError::configuration(format!(
                        "unknown transformer '{other}'"
                    )))
                }
            };
            transformers.push(transformer);
        }

        Ok(Self {
            transformers,
            deprecated,
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    /// Run every pass in order. Stops at the first hard error; recorded errors
    /// from earlier passes stay in `errors`.
    pub fn run(&self, doc: &mut Document, errors: &mut ErrorCollection) -> Result<(), OptimizerError> {
        for name in &self.deprecated {
            errors.add(Error::deprecated_transformer(name));
        }
        for transformer in &self.transformers {
            let before = errors.len();
            transformer.transform(doc, errors)?;
            info!(
                transformer = transformer.name(),
                errors = errors.len() - before,
                "transformer finished"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("transformers", &self.names())
            .field("deprecated", &self.deprecated)
            .finish()
    }
}
