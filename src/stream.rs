//! Streaming batch API: emit each file's outcome as soon as it is routed.
//!
//! [`Converter::convert_batch`] returns only once the whole batch is done.
//! [`convert_stream`] yields one [`FileResult`] per file instead, so callers
//! can write outputs or update a progress bar incrementally. Files are still
//! routed one after another; the stream never runs two routes at once.
//!
//! Cancellation is checked each time the stream is polled for the next file.

use crate::convert::{CancelFlag, Converter};
use crate::error::ConvertError;
use crate::format::{ConversionOption, FileRecord};
use crate::output::ConversionOutput;
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use tracing::info;

/// Outcome for one file of a streamed batch.
#[derive(Debug)]
pub struct FileResult {
    /// 0-based position in the batch.
    pub index: usize,
    /// Input file name.
    pub name: String,
    pub result: Result<ConversionOutput, ConvertError>,
}

/// A boxed stream of per-file results borrowing the converter.
pub type FileStream<'a> = Pin<Box<dyn Stream<Item = FileResult> + Send + 'a>>;

/// Route every file in `files` from `from` to `to`, yielding results in
/// batch order.
///
/// # Example
/// ```rust,no_run
/// use edgequake_anyconv::{convert_stream, CancelFlag, Converter, ConverterConfig, Direction};
/// use edgequake_anyconv::handlers::default_registry;
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = Converter::new(default_registry(), ConverterConfig::default()).await;
/// let from = converter.find_option("md", Direction::Input)?;
/// let to = converter.find_option("html", Direction::Output)?;
/// let files = vec![edgequake_anyconv::FileRecord::new("a.md", b"# A".to_vec())];
///
/// let mut results = convert_stream(&converter, files, from, to, CancelFlag::new());
/// while let Some(item) = results.next().await {
///     match item.result {
///         Ok(out) => println!("{} → {} file(s)", item.name, out.files.len()),
///         Err(e) => eprintln!("{}: {e}", item.name),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn convert_stream<'a>(
    converter: &'a Converter,
    files: Vec<FileRecord>,
    from: &'a ConversionOption,
    to: &'a ConversionOption,
    cancel: CancelFlag,
) -> FileStream<'a> {
    let total = files.len();
    let s = stream::iter(files.into_iter().enumerate())
        .take_while(move |(index, _)| {
            let stop = cancel.is_cancelled();
            if stop {
                info!("Stream cancelled after {}/{} files", index, total);
            }
            future::ready(!stop)
        })
        .then(move |(index, file)| async move {
            if let Some(ref cb) = converter.config().progress_callback {
                cb.on_file_start(index, total, &file.name);
            }
            let result = converter
                .convert(std::slice::from_ref(&file), from, to)
                .await;
            FileResult {
                index,
                name: file.name,
                result,
            }
        });

    Box::pin(s)
}
