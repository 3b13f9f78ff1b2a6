//! Configuration types for routed conversion.
//!
//! All routing behaviour is controlled through [`ConverterConfig`], built via
//! its [`ConverterConfigBuilder`]. Everything that changes *which* paths are
//! tried, or how many, lives here so two runs can be compared by diffing their
//! configs.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound accepted for [`ConverterConfig::max_hops`].
pub const MAX_HOPS_LIMIT: usize = 32;

/// Configuration for a [`crate::convert::Converter`].
///
/// # Example
/// ```rust
/// use edgequake_anyconv::{ConverterConfig, GraphMode};
///
/// let config = ConverterConfig::builder()
///     .mode(GraphMode::Advanced)
///     .max_hops(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_hops, 4);
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Whether the graph collapses equivalent formats across handlers. Default: Simple.
    pub mode: GraphMode,

    /// Longest path (in hops) the search will produce. Range: 1–32. Default: 6.
    ///
    /// The no-repeat rule already bounds depth by the node count, but with a
    /// few hundred nodes the number of simple paths explodes long before that.
    /// Six hops covers every realistic chain (decode → rasterise → pack …).
    pub max_hops: usize,

    /// Yield to the async runtime after every hop. Default: true.
    ///
    /// Keeps progress reporting live when a long chain runs on a
    /// single-threaded runtime.
    pub yield_between_hops: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            mode: GraphMode::default(),
            max_hops: 6,
            yield_between_hops: true,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("mode", &self.mode)
            .field("max_hops", &self.max_hops)
            .field("yield_between_hops", &self.yield_between_hops)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn mode(mut self, mode: GraphMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn max_hops(mut self, n: usize) -> Self {
        self.config.max_hops = n;
        self
    }

    pub fn yield_between_hops(mut self, v: bool) -> Self {
        self.config.yield_between_hops = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConvertError> {
        let c = &self.config;
        if c.max_hops == 0 || c.max_hops > MAX_HOPS_LIMIT {
            return Err(ConvertError::InvalidConfig(format!(
                "max_hops must be 1–{MAX_HOPS_LIMIT}, got {}",
                c.max_hops
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How graph nodes are identified.
///
/// | Mode | Node identity | Effect |
/// |------|---------------|--------|
/// | Simple | `(mime, format)` | handlers sharing a format share a node; fewer, broader paths |
/// | Advanced | `(mime, format, handler)` | every declaration is its own node; the caller pins exact handlers |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GraphMode {
    #[default]
    Simple,
    Advanced,
}

impl fmt::Display for GraphMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphMode::Simple => f.write_str("simple"),
            GraphMode::Advanced => f.write_str("advanced"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConverterConfig::default();
        assert_eq!(c.mode, GraphMode::Simple);
        assert_eq!(c.max_hops, 6);
        assert!(c.yield_between_hops);
        assert!(c.progress_callback.is_none());
    }

    #[test]
    fn build_rejects_zero_hops() {
        let err = ConverterConfig::builder().max_hops(0).build().unwrap_err();
        assert!(err.to_string().contains("max_hops"));
    }

    #[test]
    fn build_rejects_excessive_hops() {
        assert!(ConverterConfig::builder()
            .max_hops(MAX_HOPS_LIMIT + 1)
            .build()
            .is_err());
        assert!(ConverterConfig::builder()
            .max_hops(MAX_HOPS_LIMIT)
            .build()
            .is_ok());
    }

    #[test]
    fn debug_hides_callback() {
        let cb: ProgressCallback = std::sync::Arc::new(crate::progress::NoopProgressCallback);
        let c = ConverterConfig::builder().progress_callback(cb).build().unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("<dyn ConversionProgressCallback>"));
    }
}
