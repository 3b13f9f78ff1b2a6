//! Path execution: drive one candidate path hop by hop.
//!
//! The executor never lets a hop failure escape as a fatal error. Whatever goes
//! wrong (initialisation, format lookup, the conversion itself, an empty
//! payload) ends *this* attempt with a [`HopError`]; the driving loop in
//! [`crate::convert`] then pulls the next candidate.
//!
//! The caller's batch is cloned up front and each hop replaces the working
//! batch wholesale, so a failed attempt leaves nothing behind for the next
//! candidate to trip over.

use crate::cache::HandlerLifecycleCache;
use crate::error::HopError;
use crate::format::{FileRecord, FormatDescriptor};
use crate::progress::ProgressCallback;
use crate::search::ConversionPath;
use std::sync::Arc;
use tracing::debug;

/// Files produced by a successful attempt, with the path that produced them.
#[derive(Debug, Clone)]
pub struct ConversionAttempt {
    pub files: Vec<FileRecord>,
    pub path: ConversionPath,
}

/// Runs candidate paths against real bytes.
#[derive(Clone)]
pub struct PathExecutor {
    cache: Arc<HandlerLifecycleCache>,
    progress: Option<ProgressCallback>,
    yield_between_hops: bool,
}

impl PathExecutor {
    pub fn new(cache: Arc<HandlerLifecycleCache>) -> Self {
        Self {
            cache,
            progress: None,
            yield_between_hops: true,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn yield_between_hops(mut self, v: bool) -> Self {
        self.yield_between_hops = v;
        self
    }

    /// Run every hop of `path` on a copy of `files`.
    ///
    /// # Errors
    /// The first [`HopError`] hit; partial output is discarded.
    pub async fn attempt_convert_path(
        &self,
        files: &[FileRecord],
        path: &ConversionPath,
    ) -> Result<ConversionAttempt, HopError> {
        let total = path.len();
        let mut current = files.to_vec();
        let mut previous: &FormatDescriptor = &path.start.format;

        for (i, hop) in path.hops.iter().enumerate() {
            let handler = &hop.handler;
            let name = handler.name();

            let formats = self.cache.ensure_ready(handler.as_ref()).await?;
            if formats.is_empty() {
                return Err(HopError::NoFormats {
                    handler: name.to_string(),
                });
            }

            let input = match_input(&formats, previous, handler.supports_any_input())
                .ok_or_else(|| HopError::FormatMismatch {
                    handler: name.to_string(),
                    format: previous.format.clone(),
                    mime: previous.media_type.clone(),
                })?;

            if let Some(ref cb) = self.progress {
                cb.on_hop_start(i + 1, total, name, &input.format, &hop.format.format);
            }
            debug!(
                "Hop {}/{}: {} → {} via '{}' ({} files)",
                i + 1,
                total,
                input.format,
                hop.format.format,
                name,
                current.len()
            );

            let output = handler
                .convert(current, &input, &hop.format, None)
                .await
                .map_err(|e| HopError::Conversion {
                    handler: name.to_string(),
                    from: input.format.clone(),
                    to: hop.format.format.clone(),
                    detail: e.to_string(),
                })?;

            if output.is_empty() {
                return Err(HopError::EmptyOutput {
                    handler: name.to_string(),
                    file: "(no files returned)".to_string(),
                });
            }
            if let Some(empty) = output.iter().find(|f| f.is_empty()) {
                return Err(HopError::EmptyOutput {
                    handler: name.to_string(),
                    file: empty.name.clone(),
                });
            }

            current = output;
            if let Some(ref cb) = self.progress {
                cb.on_hop_complete(i + 1, total, name);
            }
            if self.yield_between_hops {
                tokio::task::yield_now().await;
            }
            previous = &hop.format;
        }

        Ok(ConversionAttempt {
            files: current,
            path: path.clone(),
        })
    }
}

/// The handler's input declaration for a file currently in `previous` format.
///
/// Exact `(mime, format)` match first, then same media type. A handler that
/// accepts any input is handed `previous` itself when it declares nothing
/// closer.
fn match_input(
    formats: &[FormatDescriptor],
    previous: &FormatDescriptor,
    any_input: bool,
) -> Option<FormatDescriptor> {
    formats
        .iter()
        .filter(|f| f.accepts_input)
        .find(|f| f.same_format(previous))
        .or_else(|| {
            formats
                .iter()
                .filter(|f| f.accepts_input)
                .find(|f| f.media_type == previous.media_type)
        })
        .cloned()
        .or_else(|| any_input.then(|| previous.clone()))
}
