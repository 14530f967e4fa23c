//! Hero image preloading.
//!
//! `amp-img` elements marked `data-hero` get a preload hint in `<head>` and a
//! server-rendered `<img>` child, so the largest contentful paint does not
//! wait for the runtime.

use amp_dom::{Document, NodeId};
use tracing::debug;

use crate::config::PreloadHeroImageConfig;
use crate::error::{Error, ErrorCollection};
use crate::{OptimizerError, Transformer};

const HERO_ATTRIBUTE: &str = "data-hero";
const SSR_IMAGE_ATTRIBUTE: &str = "i-amphtml-ssr";
const IMAGE_CLASSES: &str = "i-amphtml-fill-content i-amphtml-replaced-content";

/// Attributes copied from the `amp-img` onto the rendered `<img>`.
const COPIED_ATTRIBUTES: &[&str] = &["src", "srcset", "sizes", "alt", "referrerpolicy"];

#[derive(Debug, Clone, Default)]
pub struct PreloadHeroImage {
    config: PreloadHeroImageConfig,
}

impl PreloadHeroImage {
    pub fn new(config: PreloadHeroImageConfig) -> Self {
        Self { config }
    }

    fn hero_images(&self, doc: &Document) -> Vec<NodeId> {
        doc.find_all(doc.body(), |el| el.tag == "amp-img" && el.has_attribute(HERO_ATTRIBUTE))
            .into_iter()
            .filter(|&id| !doc.has_ancestor(id, "template"))
            .collect()
    }
}

fn preload_link(doc: &mut Document, image: NodeId, src: &str) -> NodeId {
    let link = doc.create_element_with_attributes("link", &[("rel", "preload"), ("as", "image"), ("href", src)]);
    if let Some(srcset) = doc.attribute(image, "srcset").map(str::to_string) {
        doc.set_attribute(link, "imagesrcset", srcset);
        // Gone once server-side rendering has moved it into custom CSS.
        if let Some(sizes) = doc.attribute(image, "sizes").map(str::to_string) {
            doc.set_attribute(link, "imagesizes", sizes);
        }
    }
    link
}

fn rendered_image(doc: &mut Document, image: NodeId) -> NodeId {
    let img = doc.create_element("img");
    let copied: Vec<(&str, String)> = COPIED_ATTRIBUTES
        .iter()
        .filter_map(|&name| doc.attribute(image, name).map(|v| (name, v.to_string())))
        .collect();
    for (name, value) in copied {
        doc.set_attribute(img, name, value);
    }
    doc.set_attribute(img, "decoding", "async");
    doc.set_attribute(img, "class", IMAGE_CLASSES);
    img
}

impl Transformer for PreloadHeroImage {
    fn name(&self) -> &'static str {
        "PreloadHeroImage"
    }

    #[tracing::instrument(name = "PreloadHeroImage", skip_all)]
    fn transform(&self, doc: &mut Document, errors: &mut ErrorCollection) -> Result<(), OptimizerError> {
        let heroes = self.hero_images(doc);
        let max = self.config.max_hero_images;
        if heroes.len() > max {
            errors.add(Error::too_many_hero_images(heroes.len(), max));
        }

        let head = doc.head();
        for image in heroes.into_iter().take(max) {
            if doc.has_attribute(image, SSR_IMAGE_ATTRIBUTE) {
                continue;
            }
            let Some(src) = doc.attribute(image, "src").map(str::to_string) else {
                continue;
            };
            if src.starts_with("data:") {
                debug!("skipping data URL hero image");
                continue;
            }
            let link = preload_link(doc, image, &src);
            doc.append_child(head, link);
            let img = rendered_image(doc, image);
            doc.append_child(image, img);
            doc.set_attribute(image, SSR_IMAGE_ATTRIBUTE, "");
            debug!(src = %src, "preloaded hero image");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use amp_dom::fixture::parse_document;
    use pretty_assertions::assert_eq;

    fn run(html: &str) -> (Document, ErrorCollection) {
        let mut doc = parse_document(html).unwrap();
        let mut errors = ErrorCollection::new();
        PreloadHeroImage::default().transform(&mut doc, &mut errors).unwrap();
        (doc, errors)
    }

    fn preloads(doc: &Document) -> Vec<NodeId> {
        doc.elements_by_tag(doc.head(), "link")
            .into_iter()
            .filter(|&l| doc.attribute(l, "rel") == Some("preload"))
            .collect()
    }

    #[test]
    fn test_hero_image_preloaded_and_rendered() {
        let (doc, errors) = run(
            r#"<html><head></head><body><amp-img data-hero src="/hero.jpg" alt="Hero" width="400" height="300" layout="responsive"></amp-img></body></html>"#,
        );
        assert!(errors.is_empty());
        let links = preloads(&doc);
        assert_eq!(links.len(), 1);
        assert_eq!(doc.attribute(links[0], "href"), Some("/hero.jpg"));
        assert_eq!(doc.attribute(links[0], "as"), Some("image"));

        let amp_img = doc.elements_by_tag(doc.body(), "amp-img")[0];
        assert!(doc.has_attribute(amp_img, "i-amphtml-ssr"));
        let img = doc.elements_by_tag(amp_img, "img")[0];
        assert_eq!(doc.attribute(img, "src"), Some("/hero.jpg"));
        assert_eq!(doc.attribute(img, "alt"), Some("Hero"));
        assert_eq!(doc.attribute(img, "class"), Some(IMAGE_CLASSES));
    }

    #[test]
    fn test_srcset_carried_to_preload() {
        let (doc, _) = run(
            r#"<html><head></head><body><amp-img data-hero src="/a.jpg" srcset="/a.jpg 1x, /b.jpg 2x" sizes="100vw"></amp-img></body></html>"#,
        );
        let link = preloads(&doc)[0];
        assert_eq!(doc.attribute(link, "imagesrcset"), Some("/a.jpg 1x, /b.jpg 2x"));
        assert_eq!(doc.attribute(link, "imagesizes"), Some("100vw"));
    }

    #[test]
    fn test_too_many_heroes() {
        let (doc, errors) = run(
            r#"<html><head></head><body><amp-img data-hero src="/1.jpg"></amp-img><amp-img data-hero src="/2.jpg"></amp-img><amp-img data-hero src="/3.jpg"></amp-img></body></html>"#,
        );
        assert_eq!(errors.count(ErrorKind::TooManyHeroImages), 1);
        assert_eq!(preloads(&doc).len(), 2);
        let third = doc.elements_by_tag(doc.body(), "amp-img")[2];
        assert!(!doc.has_attribute(third, "i-amphtml-ssr"));
    }

    #[test]
    fn test_data_url_skipped() {
        let (doc, _) = run(
            r#"<html><head></head><body><amp-img data-hero src="data:image/png;base64,AAAA"></amp-img></body></html>"#,
        );
        assert!(preloads(&doc).is_empty());
    }

    #[test]
    fn test_template_content_skipped() {
        let (doc, _) = run(
            r#"<html><head></head><body><template type="amp-mustache"><amp-img data-hero src="/t.jpg"></amp-img></template></body></html>"#,
        );
        assert!(preloads(&doc).is_empty());
    }

    #[test]
    fn test_second_run_is_noop() {
        let mut doc = parse_document(
            r#"<html><head></head><body><amp-img data-hero src="/hero.jpg"></amp-img></body></html>"#,
        )
        .unwrap();
        let pass = PreloadHeroImage::default();
        pass.transform(&mut doc, &mut ErrorCollection::new()).unwrap();
        let once = doc.to_html();
        pass.transform(&mut doc, &mut ErrorCollection::new()).unwrap();
        assert_eq!(doc.to_html(), once);
    }
}
