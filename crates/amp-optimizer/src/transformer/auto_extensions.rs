//! Extension script management.
//!
//! Makes the component scripts in `<head>` match what the document actually
//! uses: missing scripts are imported, unreferenced ones are dropped.

use std::sync::Arc;

use amp_dom::node::is_amp_element;
use amp_dom::{Document, ElementData, NodeId};
use serde_json::Value;
use tracing::{debug, trace};

use crate::amp::{
    extension_name, extension_script_src, is_runtime_script, BIND_DATA_ATTRIBUTE_PREFIX, CDN_HOST,
};
use crate::config::AutoExtensionsConfig;
use crate::error::{Error, ErrorCollection};
use crate::spec::ValidatorSpec;
use crate::{OptimizerError, Transformer};

/// Attributes implying an extension that the validator spec does not list.
const MANUAL_ATTRIBUTE_EXTENSIONS: &[(&str, &str)] = &[("lightbox", "amp-lightbox-gallery")];

/// Extensions kept without a reference, some only while a companion stays.
const PROTECTED_EXTENSIONS: &[(&str, Option<&str>)] = &[
    ("amp-dynamic-css-classes", None),
    ("amp-viewer-assistance", None),
    ("amp-access-laterpay", Some("amp-access")),
    ("amp-access-poool", Some("amp-access")),
    ("amp-access-scroll", Some("amp-access")),
    ("amp-subscriptions-google", Some("amp-subscriptions")),
];

const BIND_SHORTHAND_PREFIX: &str = "bind-";
const GOOGLE_SUBSCRIPTIONS_SERVICE: &str = "subscribe.google.com";

#[derive(Debug)]
struct ExtensionScripts {
    name: String,
    nodes: Vec<NodeId>,
    used: bool,
}

/// Extension scripts in encounter order.
#[derive(Debug, Default)]
struct ScriptSet {
    entries: Vec<ExtensionScripts>,
}

impl ScriptSet {
    fn insert(&mut self, name: &str, node: NodeId, used: bool) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                entry.nodes.push(node);
                entry.used |= used;
            }
            None => self.entries.push(ExtensionScripts {
                name: name.to_string(),
                nodes: vec![node],
                used,
            }),
        }
    }

    /// Mark an extension used; `false` when no script for it exists.
    fn mark_used(&mut self, name: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                entry.used = true;
                true
            }
            None => false,
        }
    }

    fn retain_needed(&mut self) {
        let kept: Vec<String> = self
            .entries
            .iter()
            .filter(|e| {
                e.used
                    || PROTECTED_EXTENSIONS
                        .iter()
                        .any(|(name, companion)| *name == e.name && companion.is_none())
            })
            .map(|e| e.name.clone())
            .collect();
        self.entries.retain(|entry| {
            let keep = entry.used
                || PROTECTED_EXTENSIONS.iter().any(|(name, companion)| {
                    *name == entry.name && companion.map_or(true, |c| kept.iter().any(|k| k == c))
                });
            if !keep {
                debug!(extension = %entry.name, "removing unused extension");
            }
            keep
        });
    }
}

pub struct AutoExtensions {
    config: AutoExtensionsConfig,
    spec: Arc<ValidatorSpec>,
}

impl AutoExtensions {
    pub fn new(config: AutoExtensionsConfig, spec: Arc<ValidatorSpec>) -> Self {
        Self { config, spec }
    }

    /// Detach the runtime and every extension script from `<head>`.
    fn extract_scripts(&self, doc: &mut Document, head: NodeId) -> (Vec<NodeId>, ScriptSet) {
        let mut runtime = Vec::new();
        let mut scripts = ScriptSet::default();
        for child in doc.element_children(head) {
            let Some(el) = doc.element(child) else {
                continue;
            };
            if is_runtime_script(el) {
                runtime.push(child);
            } else if let Some(name) = extension_name(el).map(str::to_string) {
                scripts.insert(&name, child, false);
            } else {
                continue;
            }
            doc.detach(child);
        }
        (runtime, scripts)
    }

    /// Extensions implied by `amp-access` and `amp-subscriptions` configuration.
    fn configured_extensions(&self, doc: &Document, head: NodeId, errors: &mut ErrorCollection) -> Vec<String> {
        let mut out = Vec::new();
        for script in doc.element_children(head) {
            if !doc.is_tag(script, "script") || doc.attribute(script, "type") != Some("application/json") {
                continue;
            }
            let Some(id) = doc.attribute(script, "id") else {
                continue;
            };
            if id != "amp-access" && id != "amp-subscriptions" {
                continue;
            }
            out.push(id.to_string());
            let config = match serde_json::from_str::<Value>(doc.text_content(script).trim()) {
                Ok(config) => config,
                Err(e) => {
                    errors.add(Error::invalid_json(&format!("{id} configuration"), e));
                    continue;
                }
            };
            if id == "amp-access" {
                out.extend(access_vendors(&config).into_iter().map(|v| format!("amp-access-{v}")));
            } else if uses_google_subscriptions(&config) {
                out.push("amp-subscriptions-google".to_string());
            }
        }
        out
    }

    fn rewrite_bind_shorthand(&self, doc: &mut Document) {
        let root = doc.root();
        for node in doc.find_all(root, |el| {
            el.attributes.iter().any(|a| a.name.starts_with(BIND_SHORTHAND_PREFIX))
        }) {
            let Some(el) = doc.element_mut(node) else {
                continue;
            };
            let names: Vec<String> = el
                .attributes
                .iter()
                .filter(|a| a.name.starts_with(BIND_SHORTHAND_PREFIX))
                .map(|a| a.name.clone())
                .collect();
            for name in names {
                let renamed = format!(
                    "{BIND_DATA_ATTRIBUTE_PREFIX}{}",
                    &name[BIND_SHORTHAND_PREFIX.len()..]
                );
                el.rename_attribute(&name, &renamed);
            }
        }
    }

    /// Extensions an element needs, by tag, template type and attributes.
    fn element_extensions(&self, el: &ElementData) -> Vec<String> {
        let tag = el.tag.as_str();
        let mut out: Vec<String> = self
            .spec
            .extensions_for_tag(tag)
            .into_iter()
            .map(str::to_string)
            .collect();

        let template = match tag {
            "template" => el.attribute("type"),
            "script" => el.attribute("template"),
            _ => None,
        };
        if let Some(template) = template.filter(|t| t.starts_with("amp-")) {
            out.push(template.to_string());
        }
        if tag == "input" && el.has_attribute("mask") {
            out.push("amp-inputmask".to_string());
        }

        for attr in &el.attributes {
            let name = attr.name.as_str();
            for (manual, extension) in MANUAL_ATTRIBUTE_EXTENSIONS {
                if name == *manual {
                    out.push(extension.to_string());
                }
            }
            out.extend(
                self.spec
                    .extensions_for_attribute(tag, name)
                    .into_iter()
                    .map(str::to_string),
            );
            if is_bind_attribute(name) {
                out.push("amp-bind".to_string());
            }
        }
        out
    }

    fn create_script(&self, doc: &mut Document, name: &str) -> Option<NodeId> {
        let Some(extension) = self.spec.extension(name) else {
            debug!(extension = name, "extension missing from validator spec");
            return None;
        };
        let version = self
            .config
            .extension_versions
            .get(name)
            .map(String::as_str)
            .unwrap_or_else(|| extension.latest());
        let src = extension_script_src(CDN_HOST, name, version, false);
        Some(doc.create_element_with_attributes(
            "script",
            &[
                ("async", ""),
                (extension.extension_type.script_attribute(), name),
                ("src", src.as_str()),
            ],
        ))
    }
}

impl Transformer for AutoExtensions {
    fn name(&self) -> &'static str {
        "AutoExtensions"
    }

    #[tracing::instrument(name = "AutoExtensions", skip_all)]
    fn transform(&self, doc: &mut Document, errors: &mut ErrorCollection) -> Result<(), OptimizerError> {
        let head = doc.head();
        let (runtime, mut scripts) = self.extract_scripts(doc, head);

        if self.config.experiment_bind_attribute {
            self.rewrite_bind_shorthand(doc);
        }

        let mut required = self.configured_extensions(doc, head, errors);
        let root = doc.root();
        for node in doc.descendants(root) {
            if let Some(el) = doc.element(node) {
                // Components keep their script even without a validator entry.
                if is_amp_element(&el.tag) {
                    scripts.mark_used(&el.tag);
                }
                for name in self.element_extensions(el) {
                    if !required.contains(&name) {
                        required.push(name);
                    }
                }
            }
        }

        for name in &required {
            if scripts.mark_used(name) {
                continue;
            }
            if !self.config.auto_extension_import || self.config.ignore.contains(name) {
                continue;
            }
            if let Some(script) = self.create_script(doc, name) {
                trace!(extension = %name, "importing extension");
                scripts.insert(name, script, true);
            }
        }

        if self.config.auto_extension_removal {
            scripts.retain_needed();
        }

        let mut reference = insertion_anchor(doc, head);
        let nodes = runtime
            .into_iter()
            .chain(scripts.entries.into_iter().flat_map(|e| e.nodes));
        for node in nodes {
            match reference {
                Some(anchor) => doc.insert_after(head, node, anchor),
                None => doc.prepend_child(head, node),
            }
            reference = Some(node);
        }
        Ok(())
    }
}

fn is_bind_attribute(name: &str) -> bool {
    (name.starts_with('[') && name.ends_with(']')) || name.starts_with(BIND_DATA_ATTRIBUTE_PREFIX)
}

/// Viewport meta, else charset meta, else the first head child.
fn insertion_anchor(doc: &Document, head: NodeId) -> Option<NodeId> {
    let metas: Vec<NodeId> = doc
        .element_children(head)
        .into_iter()
        .filter(|&c| doc.is_tag(c, "meta"))
        .collect();
    metas
        .iter()
        .copied()
        .find(|&m| doc.attribute(m, "name") == Some("viewport"))
        .or_else(|| metas.iter().copied().find(|&m| doc.has_attribute(m, "charset")))
        .or_else(|| doc.children(head).first().copied())
}

/// `vendor` keys of an `amp-access` config, which may be a single provider or a list.
fn access_vendors(config: &Value) -> Vec<String> {
    let providers: Vec<&Value> = match config {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    providers
        .into_iter()
        .filter_map(|p| p.get("vendor").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn uses_google_subscriptions(config: &Value) -> bool {
    config
        .get("services")
        .and_then(Value::as_array)
        .is_some_and(|services| {
            services
                .iter()
                .any(|s| s.get("serviceId").and_then(Value::as_str) == Some(GOOGLE_SUBSCRIPTIONS_SERVICE))
        })
}
