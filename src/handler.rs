//! The capability contract every conversion handler implements.
//!
//! The router never looks inside a handler: it only reads the format list
//! returned by [`FormatHandler::init`] and calls [`FormatHandler::convert`]
//! with a batch of files and a declared input/output pair. Readiness and the
//! cached format list are owned by [`crate::cache::HandlerLifecycleCache`], so
//! handlers themselves stay immutable and shareable behind an `Arc`.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use edgequake_anyconv::{FileRecord, FormatDescriptor, FormatHandler, HandlerError};
//!
//! struct Upper;
//!
//! #[async_trait]
//! impl FormatHandler for Upper {
//!     fn name(&self) -> &str {
//!         "upper"
//!     }
//!
//!     async fn init(&self) -> Result<Vec<FormatDescriptor>, HandlerError> {
//!         Ok(vec![
//!             FormatDescriptor::new("Text", "txt", "txt", "text/plain").readable(),
//!             FormatDescriptor::new("Shouting", "shout", "txt", "text/x-shout").writable(),
//!         ])
//!     }
//!
//!     async fn convert(
//!         &self,
//!         files: Vec<FileRecord>,
//!         _input: &FormatDescriptor,
//!         _output: &FormatDescriptor,
//!         _args: Option<&[String]>,
//!     ) -> Result<Vec<FileRecord>, HandlerError> {
//!         Ok(files
//!             .into_iter()
//!             .map(|f| FileRecord::new(f.name, f.bytes.to_ascii_uppercase()))
//!             .collect())
//!     }
//! }
//! ```

use crate::error::HandlerError;
use crate::format::{FileRecord, FormatDescriptor};
use async_trait::async_trait;
use std::sync::Arc;

/// A pluggable conversion component.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// path that routes through it.
#[async_trait]
pub trait FormatHandler: Send + Sync {
    /// Unique, stable identifier. Used as the cache and snapshot key.
    fn name(&self) -> &str;

    /// When true, the graph adds an edge from every node to each of this
    /// handler's outputs, whether or not the source format is declared.
    fn supports_any_input(&self) -> bool {
        false
    }

    /// Prepare the handler and declare its formats.
    ///
    /// Called at most once per process lifetime through the lifecycle cache.
    /// An error excludes the handler from routing until the cache is cleared.
    async fn init(&self) -> Result<Vec<FormatDescriptor>, HandlerError>;

    /// Convert a batch of files from `input` to `output`.
    ///
    /// Returning a zero-byte file is treated as failure by the executor.
    async fn convert(
        &self,
        files: Vec<FileRecord>,
        input: &FormatDescriptor,
        output: &FormatDescriptor,
        args: Option<&[String]>,
    ) -> Result<Vec<FileRecord>, HandlerError>;
}

/// Shared handle to a registered handler.
pub type HandlerRef = Arc<dyn FormatHandler>;
