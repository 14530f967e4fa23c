//! AMP layout rules.
//!
//! The closed set of layouts, the inference table the runtime uses when no
//! layout is authored, and the per-tag default dimensions.

use crate::css::CssLength;

/// Authored `layout` values server-side rendering knows how to apply.
/// The empty string stands for "no layout attribute".
pub const SUPPORTED_LAYOUTS: &[&str] = &[
    "",
    "nodisplay",
    "fixed",
    "fixed-height",
    "responsive",
    "container",
    "fill",
    "flex-item",
    "fluid",
    "intrinsic",
];

/// Check an authored `layout` value against [`SUPPORTED_LAYOUTS`], ignoring ASCII case.
pub fn is_supported(authored: &str) -> bool {
    SUPPORTED_LAYOUTS.iter().any(|l| l.eq_ignore_ascii_case(authored))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    Nodisplay,
    Fixed,
    FixedHeight,
    Responsive,
    Container,
    Fill,
    FlexItem,
    Fluid,
    Intrinsic,
}

impl Layout {
    /// Parse a `layout` attribute. Absent and unrecognized values are `None`.
    pub fn parse(value: Option<&str>) -> Option<Layout> {
        match value?.trim().to_ascii_lowercase().as_str() {
            "nodisplay" => Some(Layout::Nodisplay),
            "fixed" => Some(Layout::Fixed),
            "fixed-height" => Some(Layout::FixedHeight),
            "responsive" => Some(Layout::Responsive),
            "container" => Some(Layout::Container),
            "fill" => Some(Layout::Fill),
            "flex-item" => Some(Layout::FlexItem),
            "fluid" => Some(Layout::Fluid),
            "intrinsic" => Some(Layout::Intrinsic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Layout::Nodisplay => "nodisplay",
            Layout::Fixed => "fixed",
            Layout::FixedHeight => "fixed-height",
            Layout::Responsive => "responsive",
            Layout::Container => "container",
            Layout::Fill => "fill",
            Layout::FlexItem => "flex-item",
            Layout::Fluid => "fluid",
            Layout::Intrinsic => "intrinsic",
        }
    }

    /// `i-amphtml-layout-<layout>`
    pub fn class_name(self) -> String {
        format!("i-amphtml-layout-{}", self.as_str())
    }

    /// Layouts whose box size is known before the element loads.
    pub fn is_size_defined(self) -> bool {
        matches!(
            self,
            Layout::Fixed
                | Layout::FixedHeight
                | Layout::Responsive
                | Layout::Fill
                | Layout::FlexItem
                | Layout::Fluid
                | Layout::Intrinsic
        )
    }

    /// Whether `width` and `height` are sufficient to apply this layout.
    pub fn accepts_dimensions(self, width: &CssLength, height: &CssLength) -> bool {
        match self {
            Layout::Fixed => {
                width.is_defined() && !width.is_fluid() && height.is_defined() && !height.is_fluid()
            }
            Layout::FixedHeight => {
                height.is_defined() && !height.is_fluid() && (!width.is_defined() || width.is_auto())
            }
            Layout::Responsive | Layout::Intrinsic => width.is_numeric() && height.is_numeric(),
            _ => true,
        }
    }
}

/// Deduce the layout when none was authored.
pub fn calculate(
    input: Option<Layout>,
    width: &CssLength,
    height: &CssLength,
    has_sizes_or_heights: bool,
) -> Layout {
    if let Some(layout) = input {
        return layout;
    }
    if !width.is_defined() && !height.is_defined() {
        Layout::Container
    } else if height.is_defined() && (!width.is_defined() || width.is_auto()) {
        Layout::FixedHeight
    } else if height.is_defined() && width.is_defined() && has_sizes_or_heights {
        Layout::Responsive
    } else {
        Layout::Fixed
    }
}

/// Dimensions the runtime assumes for some tags when none are authored.
pub fn default_dimensions(tag: &str) -> Option<(&'static str, &'static str)> {
    match tag {
        "amp-analytics" | "amp-pixel" => Some(("1px", "1px")),
        "amp-audio" => Some(("auto", "auto")),
        "amp-social-share" => Some(("60px", "44px")),
        _ => None,
    }
}

/// Fill undefined dimensions from [`default_dimensions`] when the layout is
/// absent or `fixed`.
pub fn apply_default_dimensions(
    tag: &str,
    input: Option<Layout>,
    width: CssLength,
    height: CssLength,
) -> (CssLength, CssLength) {
    if !matches!(input, None | Some(Layout::Fixed)) {
        return (width, height);
    }
    let Some((default_width, default_height)) = default_dimensions(tag) else {
        return (width, height);
    };
    let width = if width.is_defined() {
        width
    } else {
        CssLength::parse(Some(default_width), true, false)
    };
    let height = if height.is_defined() {
        height
    } else {
        CssLength::parse(Some(default_height), true, false)
    };
    (width, height)
}
