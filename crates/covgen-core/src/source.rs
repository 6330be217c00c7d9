//! Coverage source port.

use crate::error::CoverageError;
use crate::target::TargetSeed;

/// Supplies the initial per-target unit totals and, optionally, a
/// pre-existing covered-units baseline before a run starts.
///
/// Implementations are format-specific adapters (see `covgen-report` for
/// the fastcov JSON one); the model itself never reads files.
pub trait CoverageSource {
    /// Produce the target seeds for a run.
    fn targets(&self) -> Result<Vec<TargetSeed>, CoverageError>;
}

impl CoverageSource for Vec<TargetSeed> {
    fn targets(&self) -> Result<Vec<TargetSeed>, CoverageError> {
        Ok(self.clone())
    }
}
