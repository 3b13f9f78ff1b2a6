//! Built-in handlers.
//!
//! | Handler | Formats | Notes |
//! |---------|---------|-------|
//! | [`ImageHandler`]  | png, jpeg, bmp   | full mesh via the `image` crate |
//! | [`TextHandler`]   | txt, md, html    | regex rewrites |
//! | [`Base64Handler`] | base64, bin      | accepts any input |
//!
//! [`default_registry`] returns them in that order, which is also the
//! tie-breaking order for equal-length paths.

mod base64;
mod image;
mod text;

pub use self::base64::Base64Handler;
pub use self::image::ImageHandler;
pub use self::text::TextHandler;

use crate::handler::HandlerRef;
use std::sync::Arc;

/// The built-in handlers in registry order.
pub fn default_registry() -> Vec<HandlerRef> {
    vec![
        Arc::new(ImageHandler),
        Arc::new(TextHandler),
        Arc::new(Base64Handler),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::HandlerLifecycleCache;
    use crate::catalog::{Direction, FormatCatalog};
    use crate::config::GraphMode;
    use crate::graph::CapabilityGraph;

    #[tokio::test]
    async fn built_ins_bridge_binary_formats_only_through_base64() {
        let cache = HandlerLifecycleCache::new();
        let catalog = FormatCatalog::refresh(&default_registry(), &cache).await;
        assert!(catalog.skipped().is_empty());

        let graph = CapabilityGraph::build(catalog.options(), GraphMode::Simple);
        let png = catalog.find("png", Direction::Input, None).unwrap();
        let html = catalog.find("html", Direction::Output, None).unwrap();

        // Nothing produces html from binary data.
        assert_eq!(graph.search_path(png, html, 6).count(), 0);

        let b64 = catalog.find("b64", Direction::Output, None).unwrap();
        let first = graph.search_path(png, b64, 6).next().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first.hops[0].handler.name(), "base64");
    }
}
