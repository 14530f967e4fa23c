//! Non-fatal optimization errors.
//!
//! Transformers never abort on an expected failure. They skip the affected
//! optimization and record an [`Error`] here for the caller to inspect.

use std::fmt;

/// Classification of a recorded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CannotPerformServerSideRendering,
    CannotRemoveBoilerplate,
    CannotInlineRuntimeCss,
    CannotAdaptDocumentForSelfHosting,
    InvalidJson,
    InvalidHtmlAttribute,
    TooManyHeroImages,
    MissingPackage,
    DeprecatedTransformer,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::CannotPerformServerSideRendering => "CannotPerformServerSideRendering",
            ErrorKind::CannotRemoveBoilerplate => "CannotRemoveBoilerplate",
            ErrorKind::CannotInlineRuntimeCss => "CannotInlineRuntimeCss",
            ErrorKind::CannotAdaptDocumentForSelfHosting => "CannotAdaptDocumentForSelfHosting",
            ErrorKind::InvalidJson => "InvalidJson",
            ErrorKind::InvalidHtmlAttribute => "InvalidHtmlAttribute",
            ErrorKind::TooManyHeroImages => "TooManyHeroImages",
            ErrorKind::MissingPackage => "MissingPackage",
            ErrorKind::DeprecatedTransformer => "DeprecatedTransformer",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded, non-fatal error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    /// Tag name of the element the error is about, when there is one.
    pub tag: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            tag: None,
        }
    }

    pub fn on_element(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    // =========================================================================
    // Server-side rendering
    // =========================================================================

    pub fn invalid_width(tag: &str, value: &str) -> Self {
        Self::new(
            ErrorKind::CannotPerformServerSideRendering,
            format!("Cannot perform SSR: invalid input width '{value}'"),
        )
        .on_element(tag)
    }

    pub fn invalid_height(tag: &str, value: &str) -> Self {
        Self::new(
            ErrorKind::CannotPerformServerSideRendering,
            format!("Cannot perform SSR: invalid input height '{value}'"),
        )
        .on_element(tag)
    }

    pub fn unsupported_layout(tag: &str, layout: &str) -> Self {
        Self::new(
            ErrorKind::CannotPerformServerSideRendering,
            format!("Cannot perform SSR: unsupported layout '{layout}'"),
        )
        .on_element(tag)
    }

    pub fn missing_dimensions(tag: &str, layout: &str) -> Self {
        Self::new(
            ErrorKind::CannotPerformServerSideRendering,
            format!("Cannot perform SSR: layout '{layout}' needs a valid width and height"),
        )
        .on_element(tag)
    }

    pub fn exceeded_css_budget(tag: &str, attribute: &str, bytes: usize, remaining: usize) -> Self {
        Self::new(
            ErrorKind::CannotPerformServerSideRendering,
            format!(
                "Cannot perform SSR: converting '{attribute}' needs {bytes} bytes of CSS, only {remaining} left"
            ),
        )
        .on_element(tag)
    }

    pub fn render_delaying_script(extension: &str) -> Self {
        Self::new(
            ErrorKind::CannotRemoveBoilerplate,
            format!("Cannot remove boilerplate because of an unsupported render-delaying script: {extension}"),
        )
    }

    pub fn amp_experiment_in_use() -> Self {
        Self::new(
            ErrorKind::CannotRemoveBoilerplate,
            "Cannot remove boilerplate because the document contains an amp-experiment element",
        )
        .on_element("amp-experiment")
    }

    pub fn attribute_conversion(tag: &str, attribute: &str) -> Self {
        Self::new(
            ErrorKind::CannotRemoveBoilerplate,
            format!("Cannot remove boilerplate because '{attribute}' could not be converted to CSS"),
        )
        .on_element(tag)
    }

    // =========================================================================
    // Peripheral passes
    // =========================================================================

    pub fn missing_runtime_style() -> Self {
        Self::new(
            ErrorKind::CannotInlineRuntimeCss,
            "Cannot inline the runtime CSS: no <style amp-runtime> placeholder in <head>",
        )
        .on_element("style")
    }

    pub fn runtime_css_unavailable(url: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::CannotInlineRuntimeCss,
            format!("Cannot inline the runtime CSS from {url}: {reason}"),
        )
    }

    pub fn invalid_url_prefix(prefix: &str) -> Self {
        Self::new(
            ErrorKind::CannotAdaptDocumentForSelfHosting,
            format!("Cannot rewrite AMP URLs: '{prefix}' is not an absolute http(s) URL or a root-relative path"),
        )
    }

    pub fn too_many_hero_images(found: usize, max: usize) -> Self {
        Self::new(
            ErrorKind::TooManyHeroImages,
            format!("Found {found} hero images, only the first {max} are preloaded"),
        )
        .on_element("amp-img")
    }

    pub fn missing_package(package: &str, feature: &str) -> Self {
        Self::new(
            ErrorKind::MissingPackage,
            format!("'{package}' is unavailable; rebuild with the '{feature}' feature"),
        )
    }

    pub fn deprecated_transformer(name: &str) -> Self {
        Self::new(
            ErrorKind::DeprecatedTransformer,
            format!("Transformer '{name}' is deprecated and was skipped"),
        )
    }

    // =========================================================================
    // Authored markup
    // =========================================================================

    pub fn invalid_attribute(tag: &str, attribute: &str, reason: &str) -> Self {
        Self::new(
            ErrorKind::InvalidHtmlAttribute,
            format!("Invalid value for attribute '{attribute}': {reason}"),
        )
        .on_element(tag)
    }

    pub fn invalid_json(context: &str, reason: impl fmt::Display) -> Self {
        Self::new(ErrorKind::InvalidJson, format!("Invalid JSON in {context}: {reason}"))
    }
}

/// Ordered, append-only list of recorded errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorCollection {
    errors: Vec<Error>,
}

impl ErrorCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.errors.iter()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    pub fn into_vec(self) -> Vec<Error> {
        self.errors
    }
}

impl<'a> IntoIterator for &'a ErrorCollection {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collection_preserves_order() {
        let mut errors = ErrorCollection::new();
        errors.add(Error::invalid_width("amp-img", "x"));
        errors.add(Error::amp_experiment_in_use());
        let kinds: Vec<ErrorKind> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::CannotPerformServerSideRendering,
                ErrorKind::CannotRemoveBoilerplate
            ]
        );
        assert_eq!(errors.count(ErrorKind::CannotRemoveBoilerplate), 1);
        assert!(!errors.has(ErrorKind::InvalidJson));
    }

    #[test]
    fn test_display_includes_kind() {
        let err = Error::invalid_height("amp-img", "-1");
        assert_eq!(
            err.to_string(),
            "CannotPerformServerSideRendering: Cannot perform SSR: invalid input height '-1'"
        );
        assert_eq!(err.tag.as_deref(), Some("amp-img"));
    }
}
