//! The routing service and its driving loop.
//!
//! [`Converter`] owns the handler registry, the lifecycle cache, the catalog
//! and the capability graph built from it. Conversions pull candidate paths
//! from [`crate::search::PathSearch`] one at a time and hand each to
//! [`PathExecutor`] until one succeeds:
//!
//! ```text
//! search_path(from, to) ──▶ candidate #1 ──▶ execute ──✗──┐
//!                       ┌───────────────────────────────────┘
//!                       └▶ candidate #2 ──▶ execute ──✓──▶ ConversionOutput
//!                                       …
//!                       (exhausted) ──▶ ConvertError::RouteExhausted
//! ```
//!
//! An identical path is never attempted twice: the search only yields
//! distinct simple paths and the loop always advances.

use crate::cache::{HandlerLifecycleCache, SnapshotEntry};
use crate::catalog::{Direction, FormatCatalog};
use crate::config::{ConverterConfig, GraphMode};
use crate::error::ConvertError;
use crate::executor::PathExecutor;
use crate::format::{ConversionOption, FileRecord};
use crate::graph::CapabilityGraph;
use crate::handler::HandlerRef;
use crate::input;
use crate::output::{BatchOutput, ConversionOutput, PathFailure, RouteStats};
use crate::search::PathSearch;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cooperative cancellation for batch runs.
///
/// Checked between files only; a file already being routed finishes first.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Routing service: registry + cache + catalog + graph.
pub struct Converter {
    handlers: Vec<HandlerRef>,
    cache: Arc<HandlerLifecycleCache>,
    config: ConverterConfig,
    catalog: FormatCatalog,
    graph: CapabilityGraph,
}

impl Converter {
    /// Initialise every handler in `handlers` and build the graph.
    pub async fn new(handlers: Vec<HandlerRef>, config: ConverterConfig) -> Self {
        Self::with_cache(handlers, config, Arc::new(HandlerLifecycleCache::new())).await
    }

    /// Like [`new`](Self::new), reusing an existing (possibly seeded) cache.
    pub async fn with_cache(
        handlers: Vec<HandlerRef>,
        config: ConverterConfig,
        cache: Arc<HandlerLifecycleCache>,
    ) -> Self {
        let catalog = FormatCatalog::refresh(&handlers, &cache).await;
        let graph = CapabilityGraph::build(catalog.options(), config.mode);
        Self {
            handlers,
            cache,
            config,
            catalog,
            graph,
        }
    }

    /// Rebuild catalog and graph from the cache; only handlers not yet
    /// cached are initialised.
    pub async fn refresh(&mut self) {
        self.catalog = FormatCatalog::refresh(&self.handlers, &self.cache).await;
        self.graph = CapabilityGraph::build(self.catalog.options(), self.config.mode);
    }

    /// Drop the cache and re-initialise every handler, failed ones included.
    pub async fn rebuild(&mut self) {
        self.cache.clear();
        self.refresh().await;
    }

    /// Switch node identity; rebuilds the graph when the mode changes.
    pub fn set_mode(&mut self, mode: GraphMode) {
        if self.config.mode != mode {
            self.config.mode = mode;
            self.graph = CapabilityGraph::build(self.catalog.options(), mode);
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn handlers(&self) -> &[HandlerRef] {
        &self.handlers
    }

    pub fn cache(&self) -> &Arc<HandlerLifecycleCache> {
        &self.cache
    }

    pub fn catalog(&self) -> &FormatCatalog {
        &self.catalog
    }

    pub fn graph(&self) -> &CapabilityGraph {
        &self.graph
    }

    /// Current cache contents in snapshot form.
    pub fn export_cache(&self) -> Vec<SnapshotEntry> {
        self.cache.export_snapshot()
    }

    /// Look up an option by format code, extension or media type.
    ///
    /// `query` may pin a handler with `format@handler`, e.g. `jpeg@image`.
    pub fn find_option(
        &self,
        query: &str,
        direction: Direction,
    ) -> Result<&ConversionOption, ConvertError> {
        let (format, handler) = match query.split_once('@') {
            Some((f, h)) => (f, Some(h)),
            None => (query, None),
        };
        self.catalog
            .find(format, direction, handler)
            .ok_or_else(|| ConvertError::UnknownFormat {
                query: query.to_string(),
            })
    }

    /// Input option for a whole batch: `query` when given, otherwise the
    /// format every file's extension agrees on.
    pub fn batch_input_option(
        &self,
        files: &[FileRecord],
        query: Option<&str>,
    ) -> Result<&ConversionOption, ConvertError> {
        if let Some(q) = query {
            return self.find_option(q, Direction::Input);
        }
        let mut guesses = files.iter().map(|f| {
            self.catalog
                .guess_input(f)
                .map(|o| (f, o))
                .ok_or_else(|| ConvertError::UnknownFormat {
                    query: f.name.clone(),
                })
        });
        let (first_file, first) = guesses.next().ok_or(ConvertError::NoInputFiles)??;
        for guess in guesses {
            let (file, option) = guess?;
            if option.format.format != first.format.format
                || option.format.media_type != first.format.media_type
            {
                return Err(ConvertError::MixedInputFormats {
                    first: first_file.name.clone(),
                    first_format: first.format.format.clone(),
                    other: file.name.clone(),
                    other_format: option.format.format.clone(),
                });
            }
        }
        Ok(first)
    }

    /// Candidate paths between two options, shortest first.
    pub fn search(&self, from: &ConversionOption, to: &ConversionOption) -> PathSearch<'_> {
        self.graph.search_path(from, to, self.config.max_hops)
    }

    /// Convert `files` from `from` to `to`, falling back through candidate
    /// paths until one succeeds.
    ///
    /// # Errors
    /// [`ConvertError::RouteExhausted`] when no candidate succeeded (or none
    /// existed); [`ConvertError::NoInputFiles`] for an empty batch.
    pub async fn convert(
        &self,
        files: &[FileRecord],
        from: &ConversionOption,
        to: &ConversionOption,
    ) -> Result<ConversionOutput, ConvertError> {
        if files.is_empty() {
            return Err(ConvertError::NoInputFiles);
        }

        let started = Instant::now();
        let progress = self.config.progress_callback.as_ref();
        info!(
            "Routing {} file(s): {} → {} ({} mode)",
            files.len(),
            from,
            to,
            self.config.mode
        );
        if let Some(cb) = progress {
            cb.on_route_start(&from.format.format, &to.format.format);
        }

        let executor = PathExecutor::new(Arc::clone(&self.cache))
            .with_progress(self.config.progress_callback.clone())
            .yield_between_hops(self.config.yield_between_hops);

        let mut stats = RouteStats::default();

        for path in self.search(from, to) {
            stats.attempts += 1;
            let attempt = stats.attempts;
            let rendered = path.to_string();
            debug!("Attempt #{}: {}", attempt, rendered);
            if let Some(cb) = progress {
                cb.on_path_attempt(attempt, &rendered);
            }

            match executor.attempt_convert_path(files, &path).await {
                Ok(done) => {
                    stats.hops = done.path.len();
                    stats.total_duration_ms = started.elapsed().as_millis() as u64;
                    info!(
                        "Converted via {} after {} attempt(s) in {}ms",
                        rendered, attempt, stats.total_duration_ms
                    );
                    if let Some(cb) = progress {
                        cb.on_route_complete(true, attempt);
                    }
                    return Ok(ConversionOutput {
                        files: done.files,
                        path: done.path,
                        stats,
                    });
                }
                Err(e) => {
                    warn!("Attempt #{} ({}) failed: {}", attempt, rendered, e);
                    if let Some(cb) = progress {
                        cb.on_path_failed(attempt, &e.to_string());
                    }
                    stats.failures.push(PathFailure {
                        attempt,
                        path: rendered,
                        error: e,
                    });
                }
            }
        }

        if let Some(cb) = progress {
            cb.on_route_complete(false, stats.attempts);
        }
        warn!(
            "No route from {} to {} succeeded ({} attempts)",
            from, to, stats.attempts
        );
        Err(ConvertError::RouteExhausted {
            from: from.to_string(),
            to: to.to_string(),
            attempts: stats.attempts,
            last_error: stats.failures.last().map(|f| f.error.to_string()),
        })
    }

    /// Route each file of a batch independently and sequentially.
    ///
    /// `cancel` is checked before each file; once set, the remaining files
    /// are skipped and the results so far are returned.
    pub async fn convert_batch(
        &self,
        files: Vec<FileRecord>,
        from: &ConversionOption,
        to: &ConversionOption,
        cancel: &CancelFlag,
    ) -> BatchOutput {
        let total = files.len();
        let mut out = BatchOutput::default();

        for (i, file) in files.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Batch cancelled after {}/{} files", i, total);
                out.cancelled = true;
                break;
            }
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_file_start(i, total, &file.name);
            }
            let name = file.name.clone();
            let result = self.convert(std::slice::from_ref(&file), from, to).await;
            out.results.push((name, result));
        }

        out
    }
}

/// Resolve `input` (path or URL), convert it to `to`, and write the result
/// next to `output_path`.
///
/// `from` defaults to a guess from the input's extension. A single output
/// file is written to `output_path`; several files are written into
/// `output_path` as a directory. Every write is atomic (temp file + rename).
pub async fn convert_to_file(
    converter: &Converter,
    input_str: &str,
    output_path: impl AsRef<Path>,
    from: Option<&str>,
    to: &str,
) -> Result<ConversionOutput, ConvertError> {
    let file = input::resolve_input(input_str, converter.config().download_timeout_secs).await?;

    let from = match from {
        Some(q) => converter.find_option(q, Direction::Input)?,
        None => converter
            .catalog()
            .guess_input(&file)
            .ok_or_else(|| ConvertError::UnknownFormat {
                query: file.name.clone(),
            })?,
    };
    let to = converter.find_option(to, Direction::Output)?;

    let output = converter.convert(std::slice::from_ref(&file), from, to).await?;
    write_outputs(&output.files, output_path.as_ref()).await?;
    Ok(output)
}

/// Write converted files to disk, returning the paths written.
///
/// A single file is written to `path` itself unless `path` is an existing
/// directory; several files always go into `path` as a directory.
pub async fn write_outputs(files: &[FileRecord], path: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let is_dir = tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if files.len() == 1 && !is_dir {
        write_targets(vec![(path.to_path_buf(), &files[0])]).await
    } else {
        write_into_dir(files, path).await
    }
}

/// Write every file into `dir` under its own name, creating `dir` if needed.
pub async fn write_into_dir(files: &[FileRecord], dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let targets = files
        .iter()
        .map(|f| -> Result<(PathBuf, &FileRecord), ConvertError> {
            Ok((dir.join(plain_file_name(&f.name)?), f))
        })
        .collect::<Result<Vec<_>, _>>()?;
    write_targets(targets).await
}

/// Final component of a handler-chosen name; rejects `..`, roots and empties.
fn plain_file_name(name: &str) -> Result<&std::ffi::OsStr, ConvertError> {
    Path::new(name)
        .file_name()
        .ok_or_else(|| ConvertError::UnsafeOutputName {
            name: name.to_string(),
        })
}

async fn write_targets(targets: Vec<(PathBuf, &FileRecord)>) -> Result<Vec<PathBuf>, ConvertError> {
    let mut written = Vec::with_capacity(targets.len());
    for (target, file) in targets {
        let bytes = file.bytes.clone();
        let dest = target.clone();
        tokio::task::spawn_blocking(move || write_atomic(&dest, &bytes))
            .await
            .map_err(|e| ConvertError::Internal(format!("Write task panicked: {e}")))?
            .map_err(|e| ConvertError::OutputWriteFailed {
                path: target.clone(),
                source: e,
            })?;
        debug!("Wrote {} ({} bytes)", target.display(), file.bytes.len());
        written.push(target);
    }
    Ok(written)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn write_outputs_single_file_goes_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out.txt");
        let files = vec![FileRecord::new("ignored.txt", b"hello".to_vec())];

        let written = write_outputs(&files, &target).await.unwrap();
        assert_eq!(written, vec![target.clone()]);
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn write_outputs_many_files_go_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            FileRecord::new("a.txt", b"a".to_vec()),
            FileRecord::new("b.txt", b"b".to_vec()),
        ];

        let written = write_outputs(&files, dir.path()).await.unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read(dir.path().join("b.txt")).unwrap(), b"b");
    }

    #[tokio::test]
    async fn single_file_lands_inside_an_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![FileRecord::new("a.html", b"<p>a</p>".to_vec())];

        let written = write_outputs(&files, dir.path()).await.unwrap();
        assert_eq!(written, vec![dir.path().join("a.html")]);
        assert!(dir.path().join("a.html").is_file());
    }

    #[tokio::test]
    async fn write_into_dir_creates_the_directory_for_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        write_into_dir(&[FileRecord::new("1.txt", b"1".to_vec())], &out).await.unwrap();
        write_into_dir(&[FileRecord::new("2.txt", b"2".to_vec())], &out).await.unwrap();
        assert!(out.is_dir());
        assert_eq!(std::fs::read(out.join("1.txt")).unwrap(), b"1");
        assert_eq!(std::fs::read(out.join("2.txt")).unwrap(), b"2");
    }

    #[tokio::test]
    async fn handler_names_cannot_escape_the_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let files = vec![
            FileRecord::new("../escaped.txt", b"x".to_vec()),
            FileRecord::new("/tmp/abs.txt", b"y".to_vec()),
        ];

        let written = write_into_dir(&files, &out).await.unwrap();
        assert_eq!(written, vec![out.join("escaped.txt"), out.join("abs.txt")]);
        assert!(!dir.path().join("escaped.txt").exists());

        let err = write_into_dir(&[FileRecord::new("..", b"z".to_vec())], &out)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::UnsafeOutputName { .. }));
    }
}
