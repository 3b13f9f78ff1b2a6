//! # edgequake-anyconv
//!
//! Convert files between formats by routing them through chains of small,
//! pluggable handlers.
//!
//! ## Why routing?
//!
//! No single library converts everything to everything. Each handler here
//! knows a handful of formats; the router finds a chain of handlers that
//! bridges the input format to the requested one, runs it, and falls back to
//! the next-shortest chain when a hop fails at runtime (malformed input, an
//! unsupported codec path, a handler that will not initialise).
//!
//! ## Routing Overview
//!
//! ```text
//! handlers
//!  │
//!  ├─ 1. Cache     init each handler once, memoise its declared formats
//!  ├─ 2. Catalog   flatten into (format, handler) conversion options
//!  ├─ 3. Graph     edge X → Y when some handler reads X and writes Y
//!  ├─ 4. Search    lazy BFS over simple paths, shortest first
//!  ├─ 5. Execute   run a candidate hop by hop on a copy of the files
//!  └─ 6. Fallback  on any hop failure, pull the next candidate
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_anyconv::{Converter, ConverterConfig, Direction, FileRecord};
//! use edgequake_anyconv::handlers::default_registry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new(default_registry(), ConverterConfig::default()).await;
//!     let from = converter.find_option("md", Direction::Input)?;
//!     let to = converter.find_option("html", Direction::Output)?;
//!
//!     let input = [FileRecord::new("notes.md", b"# Hello".to_vec())];
//!     let output = converter.convert(&input, from, to).await?;
//!     println!("{} via {}", output.files[0].name, output.path);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `anyconv` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-anyconv = { version = "0.1", default-features = false }
//! ```
//!
//! ## Graph Modes
//!
//! | Mode | Node identity | Use when |
//! |------|---------------|----------|
//! | `Simple`   | `(media type, format)` | Default; any handler producing PNG feeds any handler reading PNG |
//! | `Advanced` | `(media type, format, handler)` | Debugging one handler's declarations in isolation |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod catalog;
pub mod config;
pub mod convert;
pub mod error;
pub mod executor;
pub mod format;
pub mod graph;
pub mod handler;
pub mod handlers;
pub mod input;
pub mod output;
pub mod progress;
pub mod search;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{HandlerLifecycleCache, HandlerState, SnapshotEntry};
pub use catalog::{Direction, FormatCatalog, SkippedHandler};
pub use config::{ConverterConfig, ConverterConfigBuilder, GraphMode};
pub use convert::{convert_to_file, CancelFlag, Converter};
pub use error::{ConvertError, HandlerError, HopError};
pub use executor::PathExecutor;
pub use format::{ConversionOption, FileRecord, FormatDescriptor, FormatKey};
pub use graph::CapabilityGraph;
pub use handler::{FormatHandler, HandlerRef};
pub use output::{BatchOutput, ConversionOutput, PathFailure, RouteStats};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use search::{ConversionPath, PathSearch};
pub use stream::{convert_stream, FileResult};
