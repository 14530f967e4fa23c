//! Runtime CSS inlining.
//!
//! Fills the `<style amp-runtime>` placeholder with the runtime stylesheet so
//! server-rendered layouts render correctly before the runtime script loads.
//! When the stylesheet cannot be fetched a `<link rel=stylesheet>` is emitted
//! in its place.

use std::sync::Arc;

use amp_dom::{Document, NodeId};
use tracing::{debug, warn};

use crate::amp::{is_runtime_style, is_runtime_stylesheet, CDN_HOST};
use crate::config::AmpRuntimeCssConfig;
use crate::error::{Error, ErrorCollection};
use crate::transport::RemoteGetRequest;
use crate::{OptimizerError, Transformer};

const VERSION_ATTRIBUTE: &str = "i-amphtml-version";
const LATEST_VERSION: &str = "latest";

pub struct AmpRuntimeCss {
    config: AmpRuntimeCssConfig,
    transport: Arc<dyn RemoteGetRequest>,
}

impl AmpRuntimeCss {
    pub fn new(config: AmpRuntimeCssConfig, transport: Arc<dyn RemoteGetRequest>) -> Self {
        Self { config, transport }
    }

    pub fn stylesheet_url(&self) -> String {
        match self.config.version.as_deref() {
            Some(version) => format!("{CDN_HOST}/rtv/{version}/v0.css"),
            None => format!("{CDN_HOST}/v0.css"),
        }
    }

    fn fetch(&self, url: &str) -> Result<String, Error> {
        match self.transport.get(url) {
            Ok(response) if response.is_success() => Ok(response.body),
            Ok(response) => Err(Error::runtime_css_unavailable(
                url,
                format!("HTTP {}", response.status),
            )),
            Err(err) => Err(Error::runtime_css_unavailable(url, err.message)),
        }
    }
}

impl std::fmt::Debug for AmpRuntimeCss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmpRuntimeCss")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn find_runtime_style(doc: &Document, head: NodeId) -> Option<NodeId> {
    doc.element_children(head)
        .into_iter()
        .find(|&c| doc.element(c).is_some_and(is_runtime_style))
}

impl Transformer for AmpRuntimeCss {
    fn name(&self) -> &'static str {
        "AmpRuntimeCss"
    }

    #[tracing::instrument(name = "AmpRuntimeCss", skip_all)]
    fn transform(&self, doc: &mut Document, errors: &mut ErrorCollection) -> Result<(), OptimizerError> {
        let head = doc.head();
        let Some(style) = find_runtime_style(doc, head) else {
            errors.add(Error::missing_runtime_style());
            return Ok(());
        };
        let already_inlined =
            doc.has_attribute(style, VERSION_ATTRIBUTE) && !doc.text_content(style).is_empty();
        let already_linked = doc
            .element_children(head)
            .into_iter()
            .any(|c| doc.element(c).is_some_and(is_runtime_stylesheet));
        if already_inlined || already_linked {
            return Ok(());
        }

        let url = self.stylesheet_url();
        match self.fetch(&url) {
            Ok(css) => {
                let version = self.config.version.as_deref().unwrap_or(LATEST_VERSION);
                doc.set_text_content(style, &css);
                doc.set_attribute(style, VERSION_ATTRIBUTE, version);
                debug!(bytes = css.len(), version, "inlined runtime CSS");
            }
            Err(err) => {
                warn!(url = %url, "{}", err.message);
                errors.add(err);
                let link = doc.create_element_with_attributes("link", &[("rel", "stylesheet"), ("href", url.as_str())]);
                doc.insert_after(head, link, style);
            }
        }
        Ok(())
    }
}
