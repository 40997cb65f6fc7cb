//! Aggregate results of a run.
//!
//! The dispatcher appends one [`TargetRecord`] per processed target; the
//! finished [`BuildReport`] is logged by the binary and returned to library
//! callers.
//!
//! # Example
//!
//! ```rust
//! use static_prerender::BuildReport;
//!
//! let report = BuildReport::default();
//! assert_eq!(report.to_string(), "BuildReport { succeeded: 0, failed: 0, no_result: 0 }");
//! ```

use std::path::{Path, PathBuf};

use crate::error::RenderError;
use crate::target::TargetIdentifier;

/// What happened to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    /// A document was written.
    Rendered {
        /// Whether the client application reported a result.
        ///
        /// `false` means the written page shows the template's default state.
        result_present: bool,
        /// Path of the written document.
        output: PathBuf,
    },
    /// No document was written for this target.
    Failed {
        /// Why processing stopped.
        reason: RenderError,
    },
}

/// One processed target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRecord {
    /// The target.
    pub target: TargetIdentifier,
    /// Worker that processed it.
    pub worker_id: usize,
    /// Result.
    pub status: TargetStatus,
}

impl TargetRecord {
    /// Whether a document was written.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self.status, TargetStatus::Rendered { .. })
    }
}

/// Counts and records of a finished run.
///
/// Records are kept in completion order, which differs from catalog order
/// when more than one worker runs.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    records: Vec<TargetRecord>,
}

impl BuildReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn record(&mut self, record: TargetRecord) {
        self.records.push(record);
    }

    /// Targets with a written document (with or without result).
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.is_success()).count()
    }

    /// Targets without a written document.
    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded()
    }

    /// Written targets whose page never reported a result.
    pub fn without_result(&self) -> usize {
        self.records
            .iter()
            .filter(|r| {
                matches!(
                    r.status,
                    TargetStatus::Rendered {
                        result_present: false,
                        ..
                    }
                )
            })
            .count()
    }

    /// Number of processed targets.
    #[inline]
    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// All records in completion order.
    pub fn records(&self) -> &[TargetRecord] {
        &self.records
    }

    /// Failed records.
    pub fn failures(&self) -> impl Iterator<Item = &TargetRecord> {
        self.records.iter().filter(|r| !r.is_success())
    }

    /// Record for `target`, if it was processed.
    pub fn get(&self, target: &TargetIdentifier) -> Option<&TargetRecord> {
        self.records.iter().find(|r| &r.target == target)
    }

    /// Path of the first written document, used for the smoke-mode hint.
    pub fn first_output(&self) -> Option<&Path> {
        self.records.iter().find_map(|r| match &r.status {
            TargetStatus::Rendered { output, .. } => Some(output.as_path()),
            TargetStatus::Failed { .. } => None,
        })
    }
}

impl std::fmt::Display for BuildReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BuildReport {{ succeeded: {}, failed: {}, no_result: {} }}",
            self.succeeded(),
            self.failed(),
            self.without_result()
        )
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
