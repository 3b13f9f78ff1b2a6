//! Format catalog: every `(format, handler)` pair currently available.
//!
//! Building the catalog is the only place where handlers get initialised in
//! bulk. A handler whose initialiser fails is skipped for this build and
//! recorded in [`FormatCatalog::skipped`]; the rest of the catalog still
//! builds.

use crate::cache::HandlerLifecycleCache;
use crate::format::{ConversionOption, FileRecord};
use crate::handler::HandlerRef;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which direction a catalog lookup is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A handler left out of the catalog because it failed to initialise.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SkippedHandler {
    pub handler: String,
    pub reason: String,
}

/// The flat option list the capability graph is built from.
#[derive(Debug, Clone, Default)]
pub struct FormatCatalog {
    options: Vec<ConversionOption>,
    skipped: Vec<SkippedHandler>,
}

impl FormatCatalog {
    /// Build the catalog from `handlers` in registry order.
    ///
    /// Handlers already cached (initialised earlier or seeded from a
    /// snapshot) are not initialised again.
    pub async fn refresh(handlers: &[HandlerRef], cache: &HandlerLifecycleCache) -> Self {
        let mut options = Vec::new();
        let mut skipped = Vec::new();

        for handler in handlers {
            match cache.ensure_ready(handler.as_ref()).await {
                Ok(formats) => {
                    debug!(
                        "Catalog: handler '{}' contributes {} formats",
                        handler.name(),
                        formats.len()
                    );
                    options.extend(
                        formats
                            .iter()
                            .map(|f| ConversionOption::new(f.clone(), Arc::clone(handler))),
                    );
                }
                Err(e) => {
                    warn!("Catalog: skipping handler '{}': {}", handler.name(), e);
                    skipped.push(SkippedHandler {
                        handler: handler.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Catalog built: {} options from {} handlers ({} skipped)",
            options.len(),
            handlers.len() - skipped.len(),
            skipped.len()
        );

        Self { options, skipped }
    }

    pub fn options(&self) -> &[ConversionOption] {
        &self.options
    }

    pub fn skipped(&self) -> &[SkippedHandler] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Find the first option matching `query` for `direction`.
    ///
    /// `query` is compared case-insensitively against, in priority order, the
    /// format code, the extension and the media type. Each field is tried
    /// across the whole catalog before the next one, so `"jpg"` prefers a
    /// format literally coded `jpg` over one that merely uses that extension.
    /// `handler` pins the lookup to one handler.
    pub fn find(
        &self,
        query: &str,
        direction: Direction,
        handler: Option<&str>,
    ) -> Option<&ConversionOption> {
        let query = query.trim().trim_start_matches('.').to_ascii_lowercase();
        let candidates = || {
            self.options.iter().filter(move |o| {
                let dir_ok = match direction {
                    Direction::Input => o.format.accepts_input,
                    Direction::Output => o.format.produces_output,
                };
                dir_ok && handler.is_none_or(|h| o.handler.name() == h)
            })
        };

        candidates()
            .find(|o| o.format.format.eq_ignore_ascii_case(&query))
            .or_else(|| candidates().find(|o| o.format.extension.eq_ignore_ascii_case(&query)))
            .or_else(|| candidates().find(|o| o.format.media_type.eq_ignore_ascii_case(&query)))
    }

    /// Guess the input option for a file from its extension.
    pub fn guess_input(&self, file: &FileRecord) -> Option<&ConversionOption> {
        let ext = file.extension()?;
        self.options
            .iter()
            .filter(|o| o.format.accepts_input)
            .find(|o| o.format.extension.eq_ignore_ascii_case(&ext))
    }
}
