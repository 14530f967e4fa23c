//! Transformer configuration.
//!
//! One section per configurable transformer. Every field has a default, so an
//! empty JSON object is a valid configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::OptimizerError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    /// Transformer names in run order; `None` uses the default order.
    pub transformers: Option<Vec<String>>,
    pub auto_extensions: AutoExtensionsConfig,
    pub server_side_rendering: ServerSideRenderingConfig,
    pub amp_runtime_css: AmpRuntimeCssConfig,
    pub rewrite_amp_urls: RewriteAmpUrlsConfig,
    pub preload_hero_image: PreloadHeroImageConfig,
    pub minify_html: MinifyHtmlConfig,
}

impl Configuration {
    pub fn from_json(json: &str) -> Result<Self, OptimizerError> {
        serde_json::from_str(json).map_err(|e| OptimizerError::configuration(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoExtensionsConfig {
    /// Add scripts for extensions the document uses but does not import.
    pub auto_extension_import: bool,
    /// Drop scripts for extensions the document imports but does not use.
    pub auto_extension_removal: bool,
    /// Rewrite `bind-foo` attributes to `data-amp-bind-foo`.
    pub experiment_bind_attribute: bool,
    /// Version pins, e.g. `{"amp-carousel": "0.1"}`.
    pub extension_versions: BTreeMap<String, String>,
    /// Extensions never added automatically.
    pub ignore: Vec<String>,
}

impl Default for AutoExtensionsConfig {
    fn default() -> Self {
        Self {
            auto_extension_import: true,
            auto_extension_removal: true,
            experiment_bind_attribute: false,
            extension_versions: BTreeMap::new(),
            ignore: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSideRenderingConfig {
    /// Delete the boilerplate pair when every element could be rendered.
    /// With `false`, layouts are still applied but the boilerplate stays.
    pub remove_boilerplate: bool,
}

impl Default for ServerSideRenderingConfig {
    fn default() -> Self {
        Self {
            remove_boilerplate: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AmpRuntimeCssConfig {
    /// Runtime version (RTV) to fetch; the current release when unset.
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteAmpUrlsConfig {
    /// Use the long-term-stable release channel.
    pub lts: bool,
    /// Pin a specific runtime version. Conflicts with `lts`.
    pub rtv: Option<String>,
    /// Serve runtime and extensions from this host or path instead of the AMP CDN.
    pub amp_url_prefix: Option<String>,
    /// Emit `type=module` twins for rewritten scripts.
    pub esm_modules_enabled: bool,
}

impl RewriteAmpUrlsConfig {
    /// Whether any rewriting was requested.
    pub fn is_active(&self) -> bool {
        self.lts || self.rtv.is_some() || self.amp_url_prefix.is_some() || self.esm_modules_enabled
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreloadHeroImageConfig {
    pub max_hero_images: usize,
}

impl Default for PreloadHeroImageConfig {
    fn default() -> Self {
        Self { max_hero_images: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifyHtmlConfig {
    pub enabled: bool,
    pub remove_comments: bool,
    pub collapse_whitespace: bool,
}

impl Default for MinifyHtmlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            remove_comments: true,
            collapse_whitespace: true,
        }
    }
}
