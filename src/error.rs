//! Error types for the edgequake-anyconv library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ConvertError`] — **Fatal**: the request cannot be satisfied at all
//!   (no route left to try, unreadable input, unknown format). Returned as
//!   `Err(ConvertError)` from [`crate::convert::Converter`] entry points.
//!
//! * [`HopError`] — **Non-fatal**: one candidate path failed at one hop
//!   (handler would not initialise, wrong input format, conversion blew up,
//!   empty output). The driving loop records it in
//!   [`crate::output::RouteStats`] and moves on to the next candidate.
//!
//! * [`HandlerError`] — what an individual [`crate::handler::FormatHandler`]
//!   returns from `init` or `convert`. The executor wraps it into a
//!   [`HopError`] carrying the hop context.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-anyconv library.
///
/// Per-hop failures use [`HopError`] and are stored in
/// [`crate::output::RouteStats`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Routing errors ────────────────────────────────────────────────────
    /// Every candidate path failed, or there was no candidate at all.
    #[error(
        "No route from '{from}' to '{to}' succeeded ({attempts} paths tried).{}",
        .last_error.as_ref().map(|e| format!("\nLast error: {e}")).unwrap_or_default()
    )]
    RouteExhausted {
        from: String,
        to: String,
        attempts: usize,
        last_error: Option<String>,
    },

    /// No catalog option matches the requested format.
    #[error("Unknown format '{query}'\nRun with --list-formats to see what is available.")]
    UnknownFormat { query: String },

    /// A batch without `--from` whose files guess to different formats.
    #[error(
        "Batch mixes input formats: '{first}' is {first_format} but '{other}' is {other_format}\n\
         Pass --from <FORMAT> or convert the files separately."
    )]
    MixedInputFormats {
        first: String,
        first_format: String,
        other: String,
        other_format: String,
    },

    /// The conversion was asked to run on an empty batch.
    #[error("No input files supplied")]
    NoInputFiles,

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Snapshot errors ───────────────────────────────────────────────────
    /// The format-cache snapshot could not be read or written.
    #[error("Format cache snapshot '{path}': {source}")]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The format-cache snapshot is not valid JSON of the expected shape.
    #[error("Format cache snapshot is malformed: {detail}")]
    SnapshotMalformed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A handler named an output file that has no plain file name.
    #[error("Refusing to write output named '{name}': not a plain file name")]
    UnsafeOutputName { name: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single hop of a single candidate path.
///
/// Aborts only the current attempt; the driving loop advances to the next
/// candidate path.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum HopError {
    /// The handler failed to initialise (now or on an earlier attempt).
    #[error("Handler '{handler}' failed to initialise: {detail}")]
    Init { handler: String, detail: String },

    /// The handler initialised but declared no formats.
    #[error("Handler '{handler}' does not declare any formats")]
    NoFormats { handler: String },

    /// The handler has no input descriptor matching the previous hop's output.
    #[error("Handler '{handler}' cannot take '{format}' ({mime}) as input")]
    FormatMismatch {
        handler: String,
        format: String,
        mime: String,
    },

    /// The handler's conversion operation returned an error.
    #[error("Handler '{handler}' failed converting {from} → {to}: {detail}")]
    Conversion {
        handler: String,
        from: String,
        to: String,
        detail: String,
    },

    /// The handler produced a zero-byte file.
    #[error("Handler '{handler}' produced an empty file '{file}'")]
    EmptyOutput { handler: String, file: String },
}

impl HopError {
    /// Name of the handler the failing hop was routed through.
    pub fn handler(&self) -> &str {
        match self {
            HopError::Init { handler, .. }
            | HopError::NoFormats { handler }
            | HopError::FormatMismatch { handler, .. }
            | HopError::Conversion { handler, .. }
            | HopError::EmptyOutput { handler, .. } => handler,
        }
    }
}

/// Errors raised by handler implementations.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Initialisation could not complete (missing codec, environment limit…).
    #[error("initialisation failed: {0}")]
    Init(String),

    /// The handler was asked for a pair it does not implement.
    #[error("unsupported conversion {from} → {to}")]
    Unsupported { from: String, to: String },

    /// The input bytes could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The output could not be encoded.
    #[error("encode failed: {0}")]
    Encode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_exhausted_display_with_last_error() {
        let e = ConvertError::RouteExhausted {
            from: "png".into(),
            to: "pdf".into(),
            attempts: 3,
            last_error: Some("Handler 'image' produced an empty file 'a.pdf'".into()),
        };
        let msg = e.to_string();
        assert!(msg.contains("'png' to 'pdf'"), "got: {msg}");
        assert!(msg.contains("3 paths tried"), "got: {msg}");
        assert!(msg.contains("Last error"), "got: {msg}");
    }

    #[test]
    fn route_exhausted_display_without_attempts() {
        let e = ConvertError::RouteExhausted {
            from: "png".into(),
            to: "mp3".into(),
            attempts: 0,
            last_error: None,
        };
        let msg = e.to_string();
        assert!(msg.contains("0 paths tried"));
        assert!(!msg.contains("Last error"));
    }

    #[test]
    fn hop_error_reports_handler() {
        let e = HopError::FormatMismatch {
            handler: "text".into(),
            format: "png".into(),
            mime: "image/png".into(),
        };
        assert_eq!(e.handler(), "text");
        assert!(e.to_string().contains("image/png"));
    }

    #[test]
    fn hop_error_serialises() {
        let e = HopError::EmptyOutput {
            handler: "base64".into(),
            file: "out.b64".into(),
        };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("EmptyOutput"));
        let back: HopError = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, e);
    }
}
