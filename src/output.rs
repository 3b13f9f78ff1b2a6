//! Output types for routed conversions.

use crate::error::HopError;
use crate::format::FileRecord;
use crate::search::{ConversionPath, PathStep};
use serde::Serialize;

/// A successful conversion: the produced files and the path that made them.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub files: Vec<FileRecord>,
    pub path: ConversionPath,
    pub stats: RouteStats,
}

impl ConversionOutput {
    /// Serialisable view without the payload bytes.
    pub fn summary(&self) -> ConversionSummary {
        ConversionSummary {
            path: self.path.steps(),
            files: self
                .files
                .iter()
                .map(|f| FileSummary {
                    name: f.name.clone(),
                    size: f.bytes.len(),
                })
                .collect(),
            stats: self.stats.clone(),
        }
    }
}

/// Routing statistics for one file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouteStats {
    /// Candidate paths executed, successful one included.
    pub attempts: usize,
    /// Hops in the successful path.
    pub hops: usize,
    /// Every abandoned candidate with the error that ended it.
    pub failures: Vec<PathFailure>,
    pub total_duration_ms: u64,
}

/// One abandoned candidate path.
#[derive(Debug, Clone, Serialize)]
pub struct PathFailure {
    pub attempt: usize,
    pub path: String,
    pub error: HopError,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionSummary {
    pub path: Vec<PathStep>,
    pub files: Vec<FileSummary>,
    pub stats: RouteStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub name: String,
    pub size: usize,
}

/// Result of a batch run: one entry per file that was routed.
#[derive(Debug, Default)]
pub struct BatchOutput {
    /// `(input file name, outcome)` in batch order.
    pub results: Vec<(String, Result<ConversionOutput, crate::error::ConvertError>)>,
    /// True when the batch stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl BatchOutput {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}
