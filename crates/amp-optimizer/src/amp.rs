//! AMP markup vocabulary shared by the transformers.

use amp_dom::ElementData;

pub const CDN_HOST: &str = "https://cdn.ampproject.org";

// Root markers
pub const LAYOUT_ATTRIBUTE: &str = "i-amphtml-layout";
pub const NO_BOILERPLATE_ATTRIBUTE: &str = "i-amphtml-no-boilerplate";
pub const TRANSFORMED_ATTRIBUTE: &str = "transformed";
pub const TRANSFORMED_VALUE: &str = "self;v=1";

// Layout classes and sizers
pub const SIZE_DEFINED_CLASS: &str = "i-amphtml-layout-size-defined";
pub const AWAITING_SIZE_CLASS: &str = "i-amphtml-layout-awaiting-size";
pub const SIZER_TAG: &str = "i-amphtml-sizer";
pub const SIZER_SLOT: &str = "i-amphtml-svc";
pub const INTRINSIC_SIZER_CLASS: &str = "i-amphtml-intrinsic-sizer";

pub const BIND_DATA_ATTRIBUTE_PREFIX: &str = "data-amp-bind-";

/// Extensions whose script must run before first paint.
pub const RENDER_DELAYING_EXTENSIONS: &[&str] =
    &["amp-dynamic-css-classes", "amp-experiment", "amp-story"];

pub const BOILERPLATE_CSS: &str = "body{-webkit-animation:-amp-start 8s steps(1,end) 0s 1 normal both;-moz-animation:-amp-start 8s steps(1,end) 0s 1 normal both;-ms-animation:-amp-start 8s steps(1,end) 0s 1 normal both;animation:-amp-start 8s steps(1,end) 0s 1 normal both}@-webkit-keyframes -amp-start{from{visibility:hidden}to{visibility:visible}}@-moz-keyframes -amp-start{from{visibility:hidden}to{visibility:visible}}@-ms-keyframes -amp-start{from{visibility:hidden}to{visibility:visible}}@-o-keyframes -amp-start{from{visibility:hidden}to{visibility:visible}}@keyframes -amp-start{from{visibility:hidden}to{visibility:visible}}";

pub const NOSCRIPT_BOILERPLATE_CSS: &str =
    "body{-webkit-animation:none;-moz-animation:none;-ms-animation:none;animation:none}";

const BOILERPLATE_ATTRIBUTES: &[&str] = &[
    "amp-boilerplate",
    "amp4ads-boilerplate",
    "amp4email-boilerplate",
];

pub fn is_render_delaying(extension: &str) -> bool {
    RENDER_DELAYING_EXTENSIONS.contains(&extension)
}

/// Extension named by a script's `custom-element`, `custom-template` or
/// `host-service` attribute.
pub fn extension_name(el: &ElementData) -> Option<&str> {
    if el.tag != "script" {
        return None;
    }
    ["custom-element", "custom-template", "host-service"]
        .into_iter()
        .find_map(|attr| el.attribute(attr))
        .filter(|name| !name.is_empty())
}

pub fn is_extension_script(el: &ElementData) -> bool {
    extension_name(el).is_some()
}

/// Path of a script or link URL with query and fragment removed.
fn url_path(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// The `v0.js` runtime, from the CDN or a self-hosted copy.
pub fn is_runtime_script(el: &ElementData) -> bool {
    if el.tag != "script" || is_extension_script(el) {
        return false;
    }
    el.attribute("src").is_some_and(|src| {
        let path = url_path(src);
        path.ends_with("/v0.js") || path.ends_with("/v0.mjs")
    })
}

pub fn is_viewer_script(el: &ElementData) -> bool {
    el.tag == "script"
        && el
            .attribute("src")
            .is_some_and(|src| url_path(src).contains("/v0/amp-viewer-integration-"))
}

pub fn is_module_script(el: &ElementData) -> bool {
    el.attribute("type") == Some("module")
}

pub fn is_boilerplate_style(el: &ElementData) -> bool {
    el.tag == "style" && BOILERPLATE_ATTRIBUTES.iter().any(|a| el.has_attribute(a))
}

pub fn is_runtime_style(el: &ElementData) -> bool {
    el.tag == "style" && el.has_attribute("amp-runtime")
}

pub fn is_custom_style(el: &ElementData) -> bool {
    el.tag == "style" && el.has_attribute("amp-custom")
}

/// `<link rel=stylesheet>` pointing at the runtime's `v0.css`.
pub fn is_runtime_stylesheet(el: &ElementData) -> bool {
    el.tag == "link"
        && el.attribute_tokens("rel").iter().any(|t| t == "stylesheet")
        && el
            .attribute("href")
            .is_some_and(|href| url_path(href).ends_with("/v0.css"))
}

/// `https://cdn.ampproject.org/v0/amp-form-0.1.js`, or `.mjs` for module builds.
pub fn extension_script_src(host: &str, name: &str, version: &str, module: bool) -> String {
    let ext = if module { "mjs" } else { "js" };
    format!("{}/v0/{name}-{version}.{ext}", host.trim_end_matches('/'))
}

pub fn runtime_script_src(host: &str) -> String {
    format!("{}/v0.js", host.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn script(attrs: &[(&str, &str)]) -> ElementData {
        let mut el = ElementData::new("script");
        for (name, value) in attrs {
            el.set_attribute(name, *value);
        }
        el
    }

    #[test]
    fn test_extension_name_from_each_attribute() {
        assert_eq!(extension_name(&script(&[("custom-element", "amp-form")])), Some("amp-form"));
        assert_eq!(
            extension_name(&script(&[("custom-template", "amp-mustache")])),
            Some("amp-mustache")
        );
        assert_eq!(extension_name(&script(&[("src", "x.js")])), None);
        assert_eq!(extension_name(&ElementData::new("div")), None);
    }

    #[test]
    fn test_runtime_script_detection() {
        assert!(is_runtime_script(&script(&[("src", "https://cdn.ampproject.org/v0.js")])));
        assert!(is_runtime_script(&script(&[("src", "https://cdn.ampproject.org/lts/v0.mjs")])));
        assert!(!is_runtime_script(&script(&[(
            "src",
            "https://cdn.ampproject.org/v0/amp-viewer-integration-0.1.js"
        )])));
    }

    #[test]
    fn test_viewer_script_detection() {
        assert!(is_viewer_script(&script(&[(
            "src",
            "https://cdn.ampproject.org/v0/amp-viewer-integration-0.1.js"
        )])));
    }

    #[test]
    fn test_extension_src() {
        assert_eq!(
            extension_script_src(CDN_HOST, "amp-form", "0.1", false),
            "https://cdn.ampproject.org/v0/amp-form-0.1.js"
        );
        assert_eq!(
            extension_script_src("/amp/", "amp-bind", "0.1", true),
            "/amp/v0/amp-bind-0.1.mjs"
        );
    }
}
