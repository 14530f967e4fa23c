//! AMP URL rewriting.
//!
//! Points runtime, extension and stylesheet URLs at a release channel, a pinned
//! runtime version or a self-hosted copy of the AMP framework.

use amp_dom::{Document, NodeId};
use tracing::debug;

use crate::amp::{is_module_script, CDN_HOST};
use crate::config::RewriteAmpUrlsConfig;
use crate::error::{Error, ErrorCollection};
use crate::{OptimizerError, Transformer};

#[derive(Debug, Clone, Default)]
pub struct RewriteAmpUrls {
    config: RewriteAmpUrlsConfig,
}

impl RewriteAmpUrls {
    pub fn new(config: RewriteAmpUrlsConfig) -> Self {
        Self { config }
    }

    /// Replacement for `CDN_HOST`, without a trailing slash.
    fn base(&self) -> Result<String, OptimizerError> {
        if self.config.lts && self.config.rtv.is_some() {
            return Err(OptimizerError::configuration(
                "'lts' and 'rtv' cannot be combined",
            ));
        }
        let host = self
            .config
            .amp_url_prefix
            .as_deref()
            .unwrap_or(CDN_HOST)
            .trim_end_matches('/');
        let base = match (&self.config.rtv, self.config.lts) {
            (Some(rtv), _) => format!("{host}/rtv/{rtv}"),
            (None, true) => format!("{host}/lts"),
            (None, false) => host.to_string(),
        };
        Ok(base)
    }

    fn is_self_hosted(&self) -> bool {
        self.config
            .amp_url_prefix
            .as_deref()
            .is_some_and(|p| p.trim_end_matches('/') != CDN_HOST)
    }
}

/// Absolute http(s) URL or a path starting at the site root.
pub fn is_valid_prefix(prefix: &str) -> bool {
    prefix.starts_with("https://")
        || prefix.starts_with("http://")
        || (prefix.starts_with('/') && !prefix.starts_with("//"))
}

/// `url` with its CDN host replaced by `base`, when it is a CDN URL.
pub fn rewrite_url(url: &str, base: &str) -> Option<String> {
    let rest = url.strip_prefix(CDN_HOST)?;
    // Already pointing at a channel or a pinned version.
    if !rest.starts_with('/') || rest.starts_with("/lts/") || rest.starts_with("/rtv/") {
        return None;
    }
    Some(format!("{base}{rest}"))
}

fn module_twin_src(src: &str) -> Option<String> {
    src.strip_suffix(".js").map(|stem| format!("{stem}.mjs"))
}

impl RewriteAmpUrls {
    fn add_module_twin(&self, doc: &mut Document, head: NodeId, script: NodeId) {
        let Some(src) = doc.attribute(script, "src").and_then(module_twin_src) else {
            return;
        };
        let twin = doc.clone_shallow(script);
        if let Some(el) = doc.element_mut(twin) {
            el.set_attribute("src", src);
            el.set_attribute("type", "module");
            el.set_attribute("crossorigin", "anonymous");
            el.remove_attribute("nomodule");
        }
        doc.set_attribute(script, "nomodule", "");
        doc.insert_after(head, twin, script);
    }
}

impl Transformer for RewriteAmpUrls {
    fn name(&self) -> &'static str {
        "RewriteAmpUrls"
    }

    #[tracing::instrument(name = "RewriteAmpUrls", skip_all)]
    fn transform(&self, doc: &mut Document, errors: &mut ErrorCollection) -> Result<(), OptimizerError> {
        let base = self.base()?;
        if let Some(prefix) = self.config.amp_url_prefix.as_deref() {
            if !is_valid_prefix(prefix) {
                errors.add(Error::invalid_url_prefix(prefix));
                return Ok(());
            }
        }

        let head = doc.head();
        let mut rewritten = 0usize;
        for child in doc.element_children(head) {
            let attribute = match doc.tag_name(child) {
                Some("script") => "src",
                Some("link") => "href",
                _ => continue,
            };
            let Some(url) = doc.attribute(child, attribute).and_then(|u| rewrite_url(u, &base)) else {
                continue;
            };
            // A `nomodule` script already has its module twin.
            let is_classic_script = attribute == "src"
                && doc
                    .element(child)
                    .is_some_and(|el| !is_module_script(el) && !el.has_attribute("nomodule"));
            doc.set_attribute(child, attribute, url);
            rewritten += 1;
            if self.config.esm_modules_enabled && is_classic_script {
                self.add_module_twin(doc, head, child);
            }
        }

        if !self.is_self_hosted() {
            let has_preconnect = doc.element_children(head).into_iter().any(|c| {
                doc.is_tag(c, "link")
                    && doc.element(c).is_some_and(|el| el.attribute_tokens("rel").iter().any(|r| r == "preconnect"))
                    && doc.attribute(c, "href") == Some(CDN_HOST)
            });
            if !has_preconnect {
                let link = doc.create_element_with_attributes(
                    "link",
                    &[("rel", "preconnect"), ("href", CDN_HOST), ("crossorigin", "")],
                );
                doc.append_child(head, link);
            }
        }
        debug!(rewritten, base = %base, "rewrote AMP URLs");
        Ok(())
    }
}
