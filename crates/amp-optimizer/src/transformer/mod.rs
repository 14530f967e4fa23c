//! Optimization passes, one module per [`crate::Transformer`].

pub mod amp_boilerplate;
pub mod amp_runtime_css;
pub mod auto_extensions;
pub mod meta_viewport;
pub mod minify_html;
pub mod preload_hero_image;
pub mod reorder_head;
pub mod rewrite_amp_urls;
pub mod server_side_rendering;
pub mod transformed_identifier;

pub use amp_boilerplate::AmpBoilerplate;
pub use amp_runtime_css::AmpRuntimeCss;
pub use auto_extensions::AutoExtensions;
pub use meta_viewport::MetaViewport;
pub use minify_html::MinifyHtml;
pub use preload_hero_image::PreloadHeroImage;
pub use reorder_head::ReorderHead;
pub use rewrite_amp_urls::RewriteAmpUrls;
pub use server_side_rendering::ServerSideRendering;
pub use transformed_identifier::TransformedIdentifier;
