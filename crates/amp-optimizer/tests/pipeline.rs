use std::sync::Arc;

use amp_dom::fixture::parse_document;
use amp_dom::{Document, NodeId};
use amp_optimizer::{
    optimize, Configuration, ErrorCollection, ErrorKind, OptimizerError, Pipeline,
    StubbedRemoteGetRequest, ValidatorSpec,
};
use pretty_assertions::assert_eq;

const RUNTIME_CSS: &str = "html{overflow-x:hidden!important}";

const BOILERPLATE: &str = "<style amp-boilerplate>body{visibility:hidden}</style><noscript><style amp-boilerplate>body{visibility:visible}</style></noscript>";

fn page(head: &str, body: &str) -> String {
    format!(
        r#"<!doctype html><html amp><head><meta charset="utf-8"><title>Page</title><link rel="canonical" href="/"><meta name="viewport" content="width=device-width"><script async src="https://cdn.ampproject.org/v0.js"></script><style amp-runtime></style>{BOILERPLATE}{head}</head><body>{body}</body></html>"#
    )
}

fn spec() -> Arc<ValidatorSpec> {
    Arc::new(ValidatorSpec::bundled().unwrap())
}

fn run_with(doc: &mut Document, config: &Configuration) -> ErrorCollection {
    let transport = StubbedRemoteGetRequest::new().with_response(
        "https://cdn.ampproject.org/v0.css",
        200,
        RUNTIME_CSS,
    );
    let pipeline = Pipeline::from_configuration(config, spec(), Arc::new(transport)).unwrap();
    let mut errors = ErrorCollection::new();
    pipeline.run(doc, &mut errors).unwrap();
    errors
}

fn run(html: &str) -> (Document, ErrorCollection) {
    let mut doc = parse_document(html).unwrap();
    let errors = run_with(&mut doc, &Configuration::default());
    (doc, errors)
}

fn head_position(doc: &Document, pred: impl Fn(&Document, NodeId) -> bool) -> usize {
    doc.element_children(doc.head())
        .into_iter()
        .position(|c| pred(doc, c))
        .unwrap()
}

fn boilerplate_styles(doc: &Document) -> usize {
    doc.find_all(doc.head(), |el| el.tag == "style" && el.has_attribute("amp-boilerplate"))
        .len()
}

fn script_srcs(doc: &Document) -> Vec<String> {
    doc.elements_by_tag(doc.head(), "script")
        .into_iter()
        .filter_map(|s| doc.attribute(s, "src").map(str::to_string))
        .collect()
}

fn extension_scripts(doc: &Document) -> Vec<String> {
    doc.elements_by_tag(doc.head(), "script")
        .into_iter()
        .filter_map(|s| doc.attribute(s, "custom-element").map(str::to_string))
        .collect()
}

// =============================================================================
// Full pipeline
// =============================================================================

#[test]
fn test_static_page_fully_optimized() {
    let (doc, errors) = run(&page(
        "",
        r#"<amp-img src="/a.jpg" width="400" height="300" layout="responsive"></amp-img>"#,
    ));
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let root = doc.root();
    assert!(doc.has_attribute(root, "i-amphtml-no-boilerplate"));
    assert_eq!(doc.attribute(root, "transformed"), Some("self;v=1"));
    assert_eq!(boilerplate_styles(&doc), 0);

    let img = doc.elements_by_tag(doc.body(), "amp-img")[0];
    assert_eq!(doc.attribute(img, "i-amphtml-layout"), Some("responsive"));

    let runtime_style = head_position(&doc, |d, c| d.has_attribute(c, "amp-runtime"));
    let runtime_script = head_position(&doc, |d, c| d.is_tag(c, "script"));
    let title = head_position(&doc, |d, c| d.is_tag(c, "title"));
    assert_eq!(head_position(&doc, |d, c| d.has_attribute(c, "charset")), 0);
    assert_eq!(
        head_position(&doc, |d, c| d.attribute(c, "name") == Some("viewport")),
        1
    );
    assert!(runtime_style < runtime_script);
    assert!(runtime_script < title);

    let style = doc.element_children(doc.head())[runtime_style];
    assert_eq!(doc.text_content(style), RUNTIME_CSS);
}

#[test]
fn test_second_run_changes_nothing() {
    let html = page(
        "",
        r#"<amp-img src="/a.jpg" width="400" height="300" layout="responsive"></amp-img><form method="post" action-xhr="/s"></form>"#,
    );
    let mut doc = parse_document(&html).unwrap();
    run_with(&mut doc, &Configuration::default());
    let once = doc.to_html();
    run_with(&mut doc, &Configuration::default());
    assert_eq!(doc.to_html(), once);
}

#[test]
fn test_second_run_with_module_scripts_changes_nothing() {
    let config =
        Configuration::from_json(r#"{"rewrite_amp_urls": {"esm_modules_enabled": true}}"#).unwrap();
    let mut doc = parse_document(&page("", "<form></form>")).unwrap();
    run_with(&mut doc, &config);
    let once = script_srcs(&doc);
    assert_eq!(once.len(), 4);
    run_with(&mut doc, &config);
    assert_eq!(script_srcs(&doc), once);
}

#[test]
fn test_used_amp_experiment_keeps_boilerplate() {
    let (doc, errors) = run(&page(
        r#"<script async custom-element="amp-experiment" src="https://cdn.ampproject.org/v0/amp-experiment-0.1.js"></script>"#,
        r#"<amp-experiment><script type="application/json">{"hero": {"variants": {"a": 50}}}</script></amp-experiment>"#,
    ));
    assert!(errors.has(ErrorKind::CannotRemoveBoilerplate));
    assert!(!doc.has_attribute(doc.root(), "i-amphtml-no-boilerplate"));
    assert_eq!(boilerplate_styles(&doc), 2);
    assert_eq!(extension_scripts(&doc), vec!["amp-experiment"]);
}

#[test]
fn test_extension_added_then_removed() {
    let (mut doc, _) = run(&page("", "<form></form>"));
    assert_eq!(extension_scripts(&doc), vec!["amp-form"]);

    let form = doc.elements_by_tag(doc.body(), "form")[0];
    doc.detach(form);
    // Layout was already applied, so only the extension pass matters here.
    let config = Configuration::from_json(r#"{"transformers": ["AutoExtensions"]}"#).unwrap();
    run_with(&mut doc, &config);
    assert!(extension_scripts(&doc).is_empty());
}

#[test]
fn test_sizes_moved_into_custom_css() {
    let (doc, errors) = run(&page(
        "",
        r#"<amp-img src="/a.jpg" srcset="/a.jpg 400w, /b.jpg 800w" sizes="(min-width: 600px) 50vw, 100vw" width="400" height="300" layout="responsive"></amp-img>"#,
    ));
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let img = doc.elements_by_tag(doc.body(), "amp-img")[0];
    assert!(!doc.has_attribute(img, "sizes"));
    let custom = doc.amp_custom_style().unwrap();
    let css = doc.text_content(custom);
    assert!(css.contains("50vw"), "{css}");
    assert_eq!(doc.css_budget().used(), css.len());
}

#[test]
fn test_hero_preload_after_sizes_conversion() {
    let (doc, errors) = run(&page(
        "",
        r#"<amp-img data-hero src="/a.jpg" srcset="/a.jpg 400w, /b.jpg 800w" sizes="(min-width: 600px) 50vw, 100vw" width="400" height="300" layout="responsive"></amp-img>"#,
    ));
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let link = doc
        .find_first(doc.head(), |el| el.tag == "link" && el.attribute("rel") == Some("preload"))
        .unwrap();
    assert_eq!(doc.attribute(link, "imagesrcset"), Some("/a.jpg 400w, /b.jpg 800w"));
    assert!(!doc.has_attribute(link, "imagesizes"));

    let amp_img = doc.elements_by_tag(doc.body(), "amp-img")[0];
    let img = doc.elements_by_tag(amp_img, "img")[0];
    assert_eq!(doc.attribute(img, "srcset"), Some("/a.jpg 400w, /b.jpg 800w"));
    let custom = doc.amp_custom_style().unwrap();
    assert!(doc.text_content(custom).contains("50vw"));
}

// =============================================================================
// Degraded runs
// =============================================================================

#[test]
fn test_offline_run_links_runtime_css() {
    let mut doc = parse_document(&page("", "")).unwrap();
    let errors = optimize(&mut doc, &Configuration::default(), spec()).unwrap();
    assert_eq!(errors.count(ErrorKind::CannotInlineRuntimeCss), 1);
    let link = doc
        .find_first(doc.head(), |el| el.tag == "link" && el.attribute("rel") == Some("stylesheet"))
        .unwrap();
    assert_eq!(doc.attribute(link, "href"), Some("https://cdn.ampproject.org/v0.css"));
}

#[test]
fn test_conflicting_release_channels_abort() {
    let config =
        Configuration::from_json(r#"{"rewrite_amp_urls": {"lts": true, "rtv": "012105150310000"}}"#).unwrap();
    let mut doc = parse_document(&page("", "")).unwrap();
    let result = optimize(&mut doc, &config, spec());
    assert!(matches!(result, Err(OptimizerError::InvalidConfiguration(_))));
}

#[test]
fn test_unknown_transformer_aborts() {
    let config = Configuration::from_json(r#"{"transformers": ["AmpBoilerplate", "Bogus"]}"#).unwrap();
    let mut doc = parse_document(&page("", "")).unwrap();
    assert!(optimize(&mut doc, &config, spec()).is_err());
}

#[test]
fn test_lts_urls_in_output() {
    let config = Configuration::from_json(r#"{"rewrite_amp_urls": {"lts": true}}"#).unwrap();
    let mut doc = parse_document(&page("", "<form></form>")).unwrap();
    run_with(&mut doc, &config);
    assert_eq!(
        script_srcs(&doc),
        vec![
            "https://cdn.ampproject.org/lts/v0.js",
            "https://cdn.ampproject.org/lts/v0/amp-form-0.1.js",
        ]
    );
}
