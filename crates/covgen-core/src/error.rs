//! Core error types.

use crate::target::TargetId;

/// Errors raised by the coverage data model.
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    /// A report referenced a target the model was never seeded with.
    #[error("unknown target: {0}")]
    UnknownTarget(TargetId),

    /// A report referenced a unit outside the target's declared total.
    ///
    /// This is a defensive check against a malformed external report
    /// parser; the merge is dropped but the run continues.
    #[error("invalid report for {target}: unit {unit} outside total {total}")]
    InvalidReport {
        target: TargetId,
        unit: u32,
        total: u32,
    },

    /// A target seed declared a baseline unit outside its own total.
    #[error("invalid seed for {target}: baseline unit {unit} outside total {total}")]
    InvalidSeed {
        target: TargetId,
        unit: u32,
        total: u32,
    },

    /// Two seeds used the same target identifier.
    #[error("duplicate target: {0}")]
    DuplicateTarget(TargetId),

    /// A coverage source could not produce its seeds.
    #[error("coverage source failed: {0}")]
    SourceFailed(String),
}
