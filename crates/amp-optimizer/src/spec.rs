//! Validator spec knowledge base.
//!
//! A read-only view of the AMP validator rules the passes consult: which tags
//! and attributes require which extension, and the versions each extension
//! ships in. The host builds one [`ValidatorSpec`] and shares it (usually
//! through an `Arc`) with every pipeline.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::OptimizerError;

/// Name of the attribute list applying to every element.
pub const GLOBAL_ATTRS: &str = "$GLOBAL_ATTRS";

const BUNDLED_SPEC: &str = include_str!("../data/validator_spec.json");

/// How an extension is declared in its `<script>` tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionType {
    /// `custom-element="amp-foo"`
    #[default]
    CustomElement,
    /// `custom-template="amp-mustache"`
    CustomTemplate,
    /// `host-service="amp-foo"`
    HostService,
}

impl ExtensionType {
    /// Attribute naming the extension on its script tag.
    pub fn script_attribute(self) -> &'static str {
        match self {
            ExtensionType::CustomElement => "custom-element",
            ExtensionType::CustomTemplate => "custom-template",
            ExtensionType::HostService => "host-service",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSpec {
    pub name: String,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    #[serde(default)]
    pub extension_type: ExtensionType,
}

impl ExtensionSpec {
    /// Newest published version, `0.1` when the spec lists none.
    pub fn latest(&self) -> &str {
        self.latest_version
            .as_deref()
            .or_else(|| {
                self.versions
                    .iter()
                    .filter(|v| v.as_str() != "latest")
                    .max_by(|a, b| compare_versions(a, b))
                    .map(String::as_str)
            })
            .unwrap_or("0.1")
    }
}

fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parts = |v: &str| -> Vec<u32> { v.split('.').filter_map(|p| p.parse().ok()).collect() };
    parts(a).cmp(&parts(b))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires_extension: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSpec {
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires_extension: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<AttrSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_spec: Option<ExtensionSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawSpec {
    #[serde(default)]
    tags: Vec<TagSpec>,
    #[serde(default)]
    attr_lists: BTreeMap<String, Vec<AttrSpec>>,
}

/// Indexed, immutable validator spec.
#[derive(Debug, Clone, Default)]
pub struct ValidatorSpec {
    tags: Vec<TagSpec>,
    attr_lists: BTreeMap<String, Vec<AttrSpec>>,
    by_tag: HashMap<String, Vec<usize>>,
    by_extension: HashMap<String, usize>,
}

impl ValidatorSpec {
    pub fn new(tags: Vec<TagSpec>, attr_lists: BTreeMap<String, Vec<AttrSpec>>) -> Self {
        let mut by_tag: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_extension = HashMap::new();
        for (index, tag) in tags.iter().enumerate() {
            by_tag
                .entry(tag.tag_name.to_ascii_lowercase())
                .or_default()
                .push(index);
            if let Some(ext) = &tag.extension_spec {
                by_extension.entry(ext.name.clone()).or_insert(index);
            }
        }
        Self {
            tags,
            attr_lists,
            by_tag,
            by_extension,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, OptimizerError> {
        let raw: RawSpec =
            serde_json::from_str(json).map_err(|e| OptimizerError::spec(e.to_string()))?;
        Ok(Self::new(raw.tags, raw.attr_lists))
    }

    /// The small spec shipped with the crate.
    pub fn bundled() -> Result<Self, OptimizerError> {
        Self::from_json(BUNDLED_SPEC)
    }

    /// All tag specs for a tag name (a tag may have several).
    pub fn tags_by_name<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a TagSpec> + 'a {
        self.by_tag
            .get(tag)
            .map(|indices| indices.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.tags[i])
    }

    pub fn extension(&self, name: &str) -> Option<&ExtensionSpec> {
        self.by_extension
            .get(name)
            .and_then(|&i| self.tags[i].extension_spec.as_ref())
    }

    pub fn attr_list(&self, name: &str) -> &[AttrSpec] {
        self.attr_lists
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn global_attributes(&self) -> &[AttrSpec] {
        self.attr_list(GLOBAL_ATTRS)
    }

    /// Extensions required by a tag name, across all of its tag specs.
    pub fn extensions_for_tag(&self, tag: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for spec in self.tags_by_name(tag) {
            for ext in &spec.requires_extension {
                if !out.contains(&ext.as_str()) {
                    out.push(ext);
                }
            }
        }
        out
    }

    /// Extensions required by an attribute on a tag, from the tag's own
    /// attribute specs and the global attribute list.
    pub fn extensions_for_attribute(&self, tag: &str, attribute: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let tag_attrs = self.tags_by_name(tag).flat_map(|t| t.attrs.iter());
        for attr in tag_attrs.chain(self.global_attributes().iter()) {
            if attr.name != attribute {
                continue;
            }
            for ext in &attr.requires_extension {
                if !out.contains(&ext.as_str()) {
                    out.push(ext);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec() -> ValidatorSpec {
        ValidatorSpec::bundled().unwrap()
    }

    #[test]
    fn test_bundled_spec_loads() {
        let spec = spec();
        assert_eq!(spec.extension("amp-form").map(|e| e.latest()), Some("0.1"));
        assert_eq!(
            spec.extension("amp-mustache").map(|e| e.extension_type),
            Some(ExtensionType::CustomTemplate)
        );
    }

    #[test]
    fn test_latest_version_picks_highest() {
        assert_eq!(spec().extension("amp-carousel").unwrap().latest(), "0.2");
        assert_eq!(spec().extension("amp-experiment").unwrap().latest(), "1.0");
    }

    #[test]
    fn test_explicit_latest_version_wins() {
        let ext = ExtensionSpec {
            name: "amp-foo".into(),
            versions: vec!["0.1".into(), "0.2".into()],
            latest_version: Some("0.1".into()),
            extension_type: ExtensionType::CustomElement,
        };
        assert_eq!(ext.latest(), "0.1");
    }

    #[test]
    fn test_extensions_for_tag_deduplicates() {
        assert_eq!(spec().extensions_for_tag("form"), vec!["amp-form"]);
        assert_eq!(spec().extensions_for_tag("amp-img"), Vec::<&str>::new());
        assert_eq!(spec().extensions_for_tag("unknown"), Vec::<&str>::new());
    }

    #[test]
    fn test_extensions_for_attribute() {
        let spec = spec();
        assert_eq!(
            spec.extensions_for_attribute("amp-img", "lightbox"),
            vec!["amp-lightbox-gallery"]
        );
        assert_eq!(
            spec.extensions_for_attribute("div", "amp-fx"),
            vec!["amp-fx-collection"]
        );
        assert!(spec.extensions_for_attribute("div", "class").is_empty());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(ValidatorSpec::from_json("{").is_err());
    }
}
