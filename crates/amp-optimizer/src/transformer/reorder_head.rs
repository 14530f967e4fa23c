//! Canonical `<head>` ordering.
//!
//! Every head child is classified into one [`HeadBucket`]; buckets are then
//! written back in declaration order. Script buckets are sorted by extension
//! name, everything else keeps its input order.

use std::collections::BTreeMap;

use amp_dom::{Document, ElementData, NodeId, NodeKind};
use tracing::trace;

use crate::amp::{
    extension_name, is_boilerplate_style, is_custom_style, is_module_script, is_render_delaying,
    is_runtime_script, is_runtime_style, is_runtime_stylesheet, is_viewer_script, CDN_HOST,
};
use crate::error::ErrorCollection;
use crate::{OptimizerError, Transformer};

const RESOURCE_HINT_TOKENS: &[&str] = &[
    "dns-prefetch",
    "preconnect",
    "prefetch",
    "preload",
    "prerender",
    "modulepreload",
];

const FAVICON_TOKENS: &[&str] = &["icon", "apple-touch-icon", "apple-touch-icon-precomposed"];

/// Output position of a head child. Variants are declared in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeadBucket {
    MetaCharset,
    MetaViewport,
    CacheResourceHint,
    RuntimeStylesheet,
    RuntimeStyle,
    Meta,
    RuntimeScript,
    ViewerScript,
    RenderDelayingScript,
    ExtensionScript,
    Favicon,
    ResourceHint,
    StylesheetBeforeCustomStyle,
    CustomStyle,
    Other,
    BoilerplateStyle,
    BoilerplateNoscript,
}

impl HeadBucket {
    /// Buckets holding at most one element; extras go to [`HeadBucket::Other`].
    pub fn is_single_slot(self) -> bool {
        matches!(
            self,
            HeadBucket::MetaCharset
                | HeadBucket::MetaViewport
                | HeadBucket::RuntimeStylesheet
                | HeadBucket::RuntimeStyle
                | HeadBucket::ViewerScript
                | HeadBucket::CustomStyle
                | HeadBucket::BoilerplateStyle
                | HeadBucket::BoilerplateNoscript
        )
    }

    fn is_script(self) -> bool {
        matches!(
            self,
            HeadBucket::RuntimeScript | HeadBucket::RenderDelayingScript | HeadBucket::ExtensionScript
        )
    }
}

/// Bucket for a head element. `custom_style_seen` tells whether
/// `<style amp-custom>` came earlier in the head.
pub fn classify(el: &ElementData, custom_style_seen: bool) -> HeadBucket {
    match el.tag.as_str() {
        "meta" => {
            if el.has_attribute("charset") {
                HeadBucket::MetaCharset
            } else if el.attribute("name").is_some_and(|n| n.eq_ignore_ascii_case("viewport")) {
                HeadBucket::MetaViewport
            } else {
                HeadBucket::Meta
            }
        }
        "link" => classify_link(el, custom_style_seen),
        "script" => {
            if is_runtime_script(el) {
                HeadBucket::RuntimeScript
            } else if is_viewer_script(el) {
                HeadBucket::ViewerScript
            } else if let Some(name) = extension_name(el) {
                if is_render_delaying(name) {
                    HeadBucket::RenderDelayingScript
                } else {
                    HeadBucket::ExtensionScript
                }
            } else {
                HeadBucket::Other
            }
        }
        "style" => {
            if is_runtime_style(el) {
                HeadBucket::RuntimeStyle
            } else if is_boilerplate_style(el) {
                HeadBucket::BoilerplateStyle
            } else if is_custom_style(el) {
                HeadBucket::CustomStyle
            } else {
                HeadBucket::Other
            }
        }
        "noscript" => HeadBucket::BoilerplateNoscript,
        _ => HeadBucket::Other,
    }
}

fn classify_link(el: &ElementData, custom_style_seen: bool) -> HeadBucket {
    let rel = el.attribute_tokens("rel");
    let has = |tokens: &[&str]| rel.iter().any(|t| tokens.contains(&t.as_str()));

    if is_runtime_stylesheet(el) {
        HeadBucket::RuntimeStylesheet
    } else if has(&["stylesheet"]) {
        if custom_style_seen {
            HeadBucket::Other
        } else {
            HeadBucket::StylesheetBeforeCustomStyle
        }
    } else if has(FAVICON_TOKENS) {
        HeadBucket::Favicon
    } else if has(RESOURCE_HINT_TOKENS) {
        if el.attribute("href").is_some_and(|h| h.starts_with(CDN_HOST)) {
            HeadBucket::CacheResourceHint
        } else {
            HeadBucket::ResourceHint
        }
    } else {
        HeadBucket::Other
    }
}

/// Sort key inside script buckets: extension name, module builds first.
fn script_key(el: &ElementData) -> (String, u8) {
    let name = extension_name(el)
        .or_else(|| el.attribute("src"))
        .unwrap_or("")
        .to_string();
    let variant = if is_module_script(el) { 0 } else { 1 };
    (name, variant)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReorderHead;

impl ReorderHead {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for ReorderHead {
    fn name(&self) -> &'static str {
        "ReorderHead"
    }

    #[tracing::instrument(name = "ReorderHead", skip_all)]
    fn transform(&self, doc: &mut Document, _errors: &mut ErrorCollection) -> Result<(), OptimizerError> {
        let head = doc.head();
        let mut buckets: BTreeMap<HeadBucket, Vec<((String, u8), NodeId)>> = BTreeMap::new();
        let mut runtime_variants: Vec<u8> = Vec::new();
        let mut custom_style_seen = false;

        for child in doc.children(head).to_vec() {
            doc.detach(child);
            let (bucket, key) = match doc.kind(child) {
                NodeKind::Text(text) if text.trim().is_empty() => continue,
                NodeKind::Text(_) | NodeKind::Comment(_) => (HeadBucket::Other, (String::new(), 0)),
                NodeKind::Element(el) => {
                    let mut bucket = classify(el, custom_style_seen);
                    let key = if bucket.is_script() {
                        script_key(el)
                    } else {
                        (String::new(), 0)
                    };
                    if bucket.is_single_slot() && buckets.contains_key(&bucket) {
                        bucket = HeadBucket::Other;
                    }
                    if bucket == HeadBucket::RuntimeScript {
                        if runtime_variants.contains(&key.1) {
                            bucket = HeadBucket::Other;
                        } else {
                            runtime_variants.push(key.1);
                        }
                    }
                    custom_style_seen |= bucket == HeadBucket::CustomStyle;
                    (bucket, key)
                }
            };
            trace!(?bucket, "classified head child");
            buckets.entry(bucket).or_default().push((key, child));
        }

        for (_, mut entries) in buckets {
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (_, node) in entries {
                doc.append_child(head, node);
            }
        }
        Ok(())
    }
}
