//! Server-side rendering of AMP layouts.
//!
//! Computes the classes, inline styles and sizers the AMP runtime would apply
//! to every custom element at load time. When every element could be rendered
//! and nothing in the document delays rendering, the boilerplate that hides
//! the page until the runtime runs is removed.

use amp_dom::{Document, NodeId};
use serde_json::Value;
use tracing::{debug, trace};

use crate::amp::{
    extension_name, is_boilerplate_style, is_render_delaying, AWAITING_SIZE_CLASS,
    INTRINSIC_SIZER_CLASS, LAYOUT_ATTRIBUTE, NO_BOILERPLATE_ATTRIBUTE, SIZER_SLOT, SIZER_TAG,
    SIZE_DEFINED_CLASS,
};
use crate::config::ServerSideRenderingConfig;
use crate::css::{format_number, format_percentage, CssLength, CssRule, CssRules, ID_SELECTOR};
use crate::error::{Error, ErrorCollection};
use crate::layout::{self, Layout};
use crate::{OptimizerError, Transformer};

const HEIGHTS_SELECTOR: &str = "#__ID__>i-amphtml-sizer";

/// A blocking attribute whose value could not be turned into CSS.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ConversionError {
    pub message: String,
}

impl ConversionError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServerSideRendering {
    config: ServerSideRenderingConfig,
}

impl ServerSideRendering {
    pub fn new(config: ServerSideRenderingConfig) -> Self {
        Self { config }
    }

    /// Render one element. Returns `false` when the element prevents
    /// boilerplate removal.
    fn render_element(&self, doc: &mut Document, element: NodeId, errors: &mut ErrorCollection) -> bool {
        let Some(tag) = doc.tag_name(element).map(str::to_string) else {
            return true;
        };

        let authored_layout = doc.attribute(element, "layout").unwrap_or("").trim().to_string();
        let input_layout = Layout::parse(Some(&authored_layout));

        let width_attr = doc.attribute(element, "width").map(str::to_string);
        let width = CssLength::parse(width_attr.as_deref(), true, false);
        if !width.is_valid() {
            errors.add(Error::invalid_width(&tag, width_attr.as_deref().unwrap_or("")));
            return false;
        }
        let height_attr = doc.attribute(element, "height").map(str::to_string);
        let height = CssLength::parse(
            height_attr.as_deref(),
            true,
            input_layout == Some(Layout::Fluid),
        );
        if !height.is_valid() {
            errors.add(Error::invalid_height(&tag, height_attr.as_deref().unwrap_or("")));
            return false;
        }

        let (width, height) = layout::apply_default_dimensions(&tag, input_layout, width, height);
        let has_sizes_or_heights =
            doc.has_attribute(element, "sizes") || doc.has_attribute(element, "heights");
        let layout = layout::calculate(input_layout, &width, &height, has_sizes_or_heights);

        if !layout::is_supported(&authored_layout) {
            errors.add(Error::unsupported_layout(&tag, &authored_layout));
            return false;
        }
        if !layout.accepts_dimensions(&width, &height) {
            errors.add(Error::missing_dimensions(&tag, layout.as_str()));
            return false;
        }

        let conversion = convert_blocking_attributes(doc, element, &tag, layout, errors);
        apply_layout(doc, element, layout, &width, &height, conversion.heights_converted);
        trace!(tag = %tag, layout = layout.as_str(), "applied layout");
        !conversion.failed
    }

    /// An `amp-experiment` with a single, non-empty JSON configuration child.
    fn is_amp_experiment_used(
        &self,
        doc: &Document,
        element: NodeId,
        errors: &mut ErrorCollection,
    ) -> bool {
        let children = doc.element_children(element);
        let [script] = children.as_slice() else {
            return false;
        };
        if !doc.is_tag(*script, "script") || doc.attribute(*script, "type") != Some("application/json")
        {
            return false;
        }
        match serde_json::from_str::<Value>(doc.text_content(*script).trim()) {
            Ok(Value::Object(config)) => !config.is_empty(),
            Ok(_) => false,
            Err(e) => {
                errors.add(Error::invalid_json("amp-experiment configuration", e));
                false
            }
        }
    }

    fn remove_boilerplate(&self, doc: &mut Document) {
        let root = doc.root();
        doc.set_attribute(root, NO_BOILERPLATE_ATTRIBUTE, "");
        let head = doc.head();
        for child in doc.element_children(head) {
            let is_boilerplate = doc.element(child).is_some_and(is_boilerplate_style)
                || (doc.is_tag(child, "noscript")
                    && doc
                        .element_children(child)
                        .into_iter()
                        .any(|c| doc.element(c).is_some_and(is_boilerplate_style)));
            if is_boilerplate {
                doc.detach(child);
            }
        }
    }
}

impl Transformer for ServerSideRendering {
    fn name(&self) -> &'static str {
        "ServerSideRendering"
    }

    #[tracing::instrument(name = "ServerSideRendering", skip_all)]
    fn transform(&self, doc: &mut Document, errors: &mut ErrorCollection) -> Result<(), OptimizerError> {
        let root = doc.root();
        if doc.has_attribute(root, LAYOUT_ATTRIBUTE) {
            debug!("layout already applied");
            return Ok(());
        }
        doc.set_attribute(root, LAYOUT_ATTRIBUTE, "");

        let mut can_remove_boilerplate = true;

        for element in doc.amp_elements() {
            if doc.has_ancestor(element, "template") {
                continue;
            }
            if doc.is_tag(element, "amp-experiment") && self.is_amp_experiment_used(doc, element, errors) {
                errors.add(Error::amp_experiment_in_use());
                can_remove_boilerplate = false;
            }
            if doc.has_attribute(element, LAYOUT_ATTRIBUTE) {
                continue;
            }
            if !self.render_element(doc, element, errors) {
                can_remove_boilerplate = false;
            }
        }

        // A used amp-experiment has already vetoed; an unused one does not delay rendering.
        let head = doc.head();
        for script in doc.element_children(head) {
            let Some(name) = doc.element(script).and_then(extension_name) else {
                continue;
            };
            if is_render_delaying(name) && name != "amp-experiment" {
                errors.add(Error::render_delaying_script(name));
                can_remove_boilerplate = false;
            }
        }

        if !can_remove_boilerplate {
            debug!("boilerplate kept");
            return Ok(());
        }
        if self.config.remove_boilerplate {
            self.remove_boilerplate(doc);
            debug!("boilerplate removed");
        }
        Ok(())
    }
}

// =============================================================================
// Blocking attribute conversion
// =============================================================================

#[derive(Debug, Default)]
struct BlockingAttributes {
    heights_converted: bool,
    failed: bool,
}

type Converter = fn(&str) -> Result<CssRules, ConversionError>;

fn convert_blocking_attributes(
    doc: &mut Document,
    element: NodeId,
    tag: &str,
    layout: Layout,
    errors: &mut ErrorCollection,
) -> BlockingAttributes {
    let authored_id = doc.has_attribute(element, "id");
    let has_srcset = doc.attribute(element, "srcset").is_some_and(|s| !s.trim().is_empty());
    let conversions: [(&str, Converter, bool); 3] = [
        ("sizes", sizes_to_css, has_srcset),
        ("heights", heights_to_css, layout == Layout::Responsive),
        ("media", media_to_css, true),
    ];

    let mut result = BlockingAttributes::default();
    let mut converted_any = false;
    for (attribute, convert, applicable) in conversions {
        if !applicable {
            continue;
        }
        let Some(value) = doc.attribute(element, attribute).map(str::to_string) else {
            continue;
        };
        if convert_attribute(doc, element, tag, attribute, convert(&value), errors) {
            converted_any = true;
            result.heights_converted |= attribute == "heights";
        } else {
            result.failed = true;
        }
    }

    // Drop an id generated for CSS that never made it into the stylesheet.
    if !authored_id && !converted_any {
        doc.remove_attribute(element, "id");
    }
    result
}

fn convert_attribute(
    doc: &mut Document,
    element: NodeId,
    tag: &str,
    attribute: &str,
    rules: Result<CssRules, ConversionError>,
    errors: &mut ErrorCollection,
) -> bool {
    let rules = match rules {
        Ok(rules) => rules,
        Err(e) => {
            debug!(tag, attribute, error = %e, "attribute not converted");
            errors.add(Error::invalid_attribute(tag, attribute, &e.message));
            errors.add(Error::attribute_conversion(tag, attribute));
            return false;
        }
    };

    let id = doc.element_id(element);
    let rules = rules.apply_id(&id);
    let bytes = rules.byte_count();
    if !doc.css_budget_mut().allocate(bytes) {
        let remaining = doc.css_budget().remaining();
        debug!(tag, attribute, bytes, remaining, "custom CSS budget exhausted");
        errors.add(Error::exceeded_css_budget(tag, attribute, bytes, remaining));
        return false;
    }
    doc.append_custom_css(&rules.to_css());
    doc.remove_attribute(element, attribute);
    true
}

/// `sizes` as `width` rules: the default first, then conditional entries last to first.
pub fn sizes_to_css(value: &str) -> Result<CssRules, ConversionError> {
    source_size_rules(value, ID_SELECTOR, "width")
}

/// `heights` as `padding-top` rules on the sizer.
pub fn heights_to_css(value: &str) -> Result<CssRules, ConversionError> {
    source_size_rules(value, HEIGHTS_SELECTOR, "padding-top")
}

/// `media` as a rule hiding the element when the query does not match.
pub fn media_to_css(value: &str) -> Result<CssRules, ConversionError> {
    let media = value.trim();
    if media.is_empty() {
        return Err(ConversionError::new("empty media query"));
    }
    let negated = match media.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("not ") => media[4..].trim().to_string(),
        _ => format!("not {media}"),
    };
    let mut rules = CssRules::new();
    rules.add(CssRule::new(ID_SELECTOR, "display:none").with_media(negated));
    Ok(rules)
}

fn source_size_rules(
    value: &str,
    selector: &str,
    property: &str,
) -> Result<CssRules, ConversionError> {
    let entries = split_top_level_commas(value);
    let Some((last, conditional)) = entries.split_last() else {
        return Err(ConversionError::new("empty list"));
    };

    let (default_media, default_value) = split_media_condition(last.trim());
    if default_value.is_empty() {
        return Err(ConversionError::new("missing default value"));
    }
    if !default_media.is_empty() {
        return Err(ConversionError::new("default value must not have a media condition"));
    }

    let mut rules = CssRules::new();
    rules.add(CssRule::new(selector, format!("{property}:{default_value}")));
    for entry in conditional.iter().rev() {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(ConversionError::new("empty entry"));
        }
        let (media, size) = split_media_condition(entry);
        if media.is_empty() {
            return Err(ConversionError::new(format!("'{entry}' has no media condition")));
        }
        rules.add(CssRule::new(selector, format!("{property}:{size}")).with_media(media));
    }
    Ok(rules)
}

/// Split on commas outside parentheses.
fn split_top_level_commas(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in value.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

/// Split `(min-width:1px) calc(100vw - 2px)` into condition and value.
fn split_media_condition(entry: &str) -> (&str, &str) {
    if entry.ends_with(')') {
        let bytes = entry.as_bytes();
        let mut depth = 0usize;
        let mut open = None;
        for (i, b) in bytes.iter().enumerate().rev() {
            match b {
                b')' => depth += 1,
                b'(' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        open = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(mut start) = open else {
            return ("", entry);
        };
        // Include a function name such as `calc`.
        while start > 0 && (bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b'-') {
            start -= 1;
        }
        let (media, value) = entry.split_at(start);
        return (media.trim(), value.trim());
    }
    match entry.rfind(char::is_whitespace) {
        Some(i) => {
            let (media, value) = entry.split_at(i);
            (media.trim(), value.trim())
        }
        None => ("", entry),
    }
}

// =============================================================================
// Layout application
// =============================================================================

fn length_css(length: &CssLength) -> String {
    if length.is_auto() {
        "auto".to_string()
    } else {
        length.to_css()
    }
}

fn layout_styles(layout: Layout, width: &CssLength, height: &CssLength) -> String {
    match layout {
        Layout::Fixed => format!("width:{};height:{};", length_css(width), length_css(height)),
        Layout::FixedHeight => format!("height:{};", length_css(height)),
        Layout::Fluid => "width:100%;height:0;".to_string(),
        Layout::FlexItem => {
            let mut styles = String::new();
            if width.is_defined() {
                styles.push_str(&format!("width:{};", length_css(width)));
            }
            if height.is_defined() {
                styles.push_str(&format!("height:{};", length_css(height)));
            }
            styles
        }
        _ => String::new(),
    }
}

/// Replace `element` with a clone carrying the computed layout.
fn apply_layout(
    doc: &mut Document,
    element: NodeId,
    layout: Layout,
    width: &CssLength,
    height: &CssLength,
    heights_converted: bool,
) -> NodeId {
    let clone = doc.clone_shallow(element);
    let styles = layout_styles(layout, width, height);
    if let Some(el) = doc.element_mut(clone) {
        el.add_class(&layout.class_name());
        if layout.is_size_defined() {
            el.add_class(SIZE_DEFINED_CLASS);
        }
        if layout == Layout::Fluid {
            el.add_class(AWAITING_SIZE_CLASS);
        }
        if !styles.is_empty() {
            let style = format!("{styles}{}", el.attribute("style").unwrap_or(""));
            el.set_attribute("style", style);
        }
        if layout == Layout::Nodisplay {
            el.set_attribute("hidden", "hidden");
        }
        el.set_attribute(LAYOUT_ATTRIBUTE, layout.as_str());
    }

    doc.move_children(element, clone);
    if let Some(sizer) = create_sizer(doc, layout, width, height, heights_converted) {
        doc.prepend_child(clone, sizer);
    }
    doc.replace(element, clone);
    clone
}

fn create_sizer(
    doc: &mut Document,
    layout: Layout,
    width: &CssLength,
    height: &CssLength,
    heights_converted: bool,
) -> Option<NodeId> {
    if !width.is_numeric()
        || !height.is_numeric()
        || width.numeral() == 0.0
        || height.numeral() == 0.0
        || width.unit() != height.unit()
    {
        return None;
    }
    match layout {
        Layout::Responsive => {
            let style = if heights_converted {
                "display:block".to_string()
            } else {
                format!(
                    "display:block;padding-top:{}%",
                    format_percentage(height.numeral() / width.numeral() * 100.0)
                )
            };
            Some(doc.create_element_with_attributes(
                SIZER_TAG,
                &[("slot", SIZER_SLOT), ("style", style.as_str())],
            ))
        }
        Layout::Intrinsic => {
            let sizer = doc.create_element_with_attributes(
                SIZER_TAG,
                &[("class", "i-amphtml-sizer"), ("slot", SIZER_SLOT)],
            );
            let src = format!(
                "data:image/svg+xml;charset=utf-8,<svg height=\"{}\" width=\"{}\" xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\"/>",
                format_number(height.numeral()),
                format_number(width.numeral()),
            );
            let img = doc.create_element_with_attributes(
                "img",
                &[
                    ("alt", ""),
                    ("aria-hidden", "true"),
                    ("class", INTRINSIC_SIZER_CLASS),
                    ("role", "presentation"),
                    ("src", &src),
                ],
            );
            doc.append_child(sizer, img);
            Some(sizer)
        }
        _ => None,
    }
}
