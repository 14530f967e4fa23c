//! CSS value types shared by the layout passes.
//!
//! [`CssLength`] parses `width`/`height`-style attributes. [`CssRule`] and
//! [`CssRules`] model the declarations synthesized from blocking attributes,
//! with a running serialized byte size.

use std::sync::OnceLock;

use regex::Regex;

/// Placeholder substituted by [`CssRule::apply_id`].
pub const ID_PLACEHOLDER: &str = "__ID__";

/// Selector template targeting the element itself.
pub const ID_SELECTOR: &str = "#__ID__";

fn length_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+(?:\.\d+)?)(px|em|rem|vh|vw|vmin|vmax)?$").expect("valid length regex")
    })
}

/// A parsed dimension attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct CssLength {
    numeral: f64,
    unit: String,
    is_defined: bool,
    is_auto: bool,
    is_fluid: bool,
    is_valid: bool,
}

impl CssLength {
    /// Parse an attribute value.
    ///
    /// A missing value is valid and undefined. `auto` and `fluid` are valid only
    /// when allowed. Numbers take an optional unit, `px` by default.
    pub fn parse(input: Option<&str>, allow_auto: bool, allow_fluid: bool) -> Self {
        let mut length = Self {
            numeral: 0.0,
            unit: "px".to_string(),
            is_defined: false,
            is_auto: false,
            is_fluid: false,
            is_valid: false,
        };

        let Some(input) = input else {
            length.is_valid = true;
            return length;
        };

        length.is_defined = true;
        match input {
            "auto" => {
                length.is_auto = true;
                length.is_valid = allow_auto;
            }
            "fluid" => {
                length.is_fluid = true;
                length.is_valid = allow_fluid;
            }
            _ => {
                if let Some(caps) = length_pattern().captures(input) {
                    if let Ok(numeral) = caps[1].parse::<f64>() {
                        length.numeral = numeral;
                        if let Some(unit) = caps.get(2) {
                            length.unit = unit.as_str().to_string();
                        }
                        length.is_valid = true;
                    }
                }
            }
        }
        length
    }

    pub fn numeral(&self) -> f64 {
        self.numeral
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn is_defined(&self) -> bool {
        self.is_defined
    }

    pub fn is_auto(&self) -> bool {
        self.is_auto
    }

    pub fn is_fluid(&self) -> bool {
        self.is_fluid
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Defined, numeric and valid.
    pub fn is_numeric(&self) -> bool {
        self.is_defined && self.is_valid && !self.is_auto && !self.is_fluid
    }

    /// `<numeral><unit>`, e.g. `100px`.
    pub fn to_css(&self) -> String {
        format!("{}{}", format_number(self.numeral), self.unit)
    }
}

/// A single synthesized rule, optionally wrapped in `@media`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssRule {
    selector: String,
    declaration: String,
    media: Option<String>,
}

impl CssRule {
    pub fn new(selector: impl Into<String>, declaration: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            declaration: declaration.into(),
            media: None,
        }
    }

    /// Empty conditions produce an unconditional rule.
    pub fn with_media(mut self, media: impl Into<String>) -> Self {
        let media = media.into().trim().to_string();
        self.media = (!media.is_empty()).then_some(media);
        self
    }

    /// Substitute the element id for the selector placeholder.
    pub fn apply_id(&self, id: &str) -> CssRule {
        CssRule {
            selector: self.selector.replace(ID_PLACEHOLDER, id),
            declaration: self.declaration.clone(),
            media: self.media.clone(),
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn declaration(&self) -> &str {
        &self.declaration
    }

    pub fn media(&self) -> Option<&str> {
        self.media.as_deref()
    }

    pub fn to_css(&self) -> String {
        let rule = format!("{}{{{}}}", self.selector, self.declaration);
        match &self.media {
            Some(media) => format!("@media {media}{{{rule}}}"),
            None => rule,
        }
    }

    pub fn byte_count(&self) -> usize {
        self.to_css().len()
    }
}

/// Append-only list of rules with their total serialized size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssRules {
    rules: Vec<CssRule>,
    byte_count: usize,
}

impl CssRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rule: CssRule) {
        self.byte_count += rule.byte_count();
        self.rules.push(rule);
    }

    pub fn extend(&mut self, other: CssRules) {
        for rule in other.rules {
            self.add(rule);
        }
    }

    pub fn apply_id(&self, id: &str) -> CssRules {
        let mut out = CssRules::new();
        for rule in &self.rules {
            out.add(rule.apply_id(id));
        }
        out
    }

    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CssRule> {
        self.rules.iter()
    }

    pub fn to_css(&self) -> String {
        self.rules.iter().map(CssRule::to_css).collect()
    }
}

/// Format a number, removing `.0` for integers.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Format a percentage rounded to four decimals, e.g. `56.25`.
pub fn format_percentage(n: f64) -> String {
    format_number((n * 10_000.0).round() / 10_000.0)
}
