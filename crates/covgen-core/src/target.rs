//! Target file identity and per-target coverage records.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::CoverageError;
use crate::unit::UnitSet;

/// Stable identifier for a target file (its path).
///
/// `Ord` on the underlying string gives the deterministic tie-break order
/// required for reproducible selection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Create an identifier from a path-like string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        debug_assert!(!id.is_empty(), "Target id must not be empty");
        Self(id)
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Construction-time description of a target, as supplied by a
/// [`crate::CoverageSource`] before the run starts.
#[derive(Debug, Clone)]
pub struct TargetSeed {
    /// Stable identifier (path).
    pub id: TargetId,
    /// Total measurable units in the target.
    pub total_units: u32,
    /// Units already covered before the run (pre-existing baseline).
    pub baseline: UnitSet,
}

impl TargetSeed {
    /// Seed with no pre-existing coverage.
    #[must_use]
    pub fn new(id: impl Into<TargetId>, total_units: u32) -> Self {
        Self {
            id: id.into(),
            total_units,
            baseline: UnitSet::new(),
        }
    }

    /// Seed with a covered-units baseline.
    pub fn with_baseline(
        id: impl Into<TargetId>,
        total_units: u32,
        baseline: UnitSet,
    ) -> Result<Self, CoverageError> {
        let id = id.into();
        if let Some(unit) = baseline.max_unit() {
            if unit >= total_units {
                return Err(CoverageError::InvalidSeed {
                    target: id,
                    unit,
                    total: total_units,
                });
            }
        }
        Ok(Self {
            id,
            total_units,
            baseline,
        })
    }
}

/// Per-target coverage record owned by the [`crate::CoverageModel`].
///
/// The covered set is monotonically non-decreasing: it is only ever
/// extended by report merges, never reset.
#[derive(Debug, Clone)]
pub struct TargetFile {
    /// Stable identifier (path).
    pub id: TargetId,
    /// Total measurable units.
    pub total_units: u32,
    /// Units covered so far.
    pub covered: UnitSet,
    /// When an attempt cycle last finished for this target.
    pub last_attempt: Option<SystemTime>,
    /// Consecutive attempt cycles that added no coverage.
    pub consecutive_failures: u32,
}

impl TargetFile {
    /// Build the initial record from a seed.
    #[must_use]
    pub fn from_seed(seed: TargetSeed) -> Self {
        Self {
            id: seed.id,
            total_units: seed.total_units,
            covered: seed.baseline,
            last_attempt: None,
            consecutive_failures: 0,
        }
    }

    /// Number of units not yet covered.
    #[must_use]
    pub fn uncovered_units(&self) -> u32 {
        self.total_units.saturating_sub(self.covered.len())
    }

    /// Units not yet covered, in ascending order.
    #[must_use]
    pub fn uncovered(&self) -> UnitSet {
        (0..self.total_units)
            .filter(|u| !self.covered.contains(*u))
            .collect()
    }

    /// Whether every declared unit is covered.
    ///
    /// A target with zero declared units is trivially fully covered and
    /// never selected.
    #[must_use]
    pub fn is_fully_covered(&self) -> bool {
        self.covered.len() >= self.total_units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_rejects_baseline_outside_total() {
        let baseline: UnitSet = [0, 9, 10].into_iter().collect();
        let err = TargetSeed::with_baseline("src/a.c", 10, baseline).unwrap_err();
        assert!(matches!(
            err,
            CoverageError::InvalidSeed { unit: 10, total: 10, .. }
        ));
    }

    #[test]
    fn test_uncovered_units() {
        let baseline: UnitSet = [0, 1, 2].into_iter().collect();
        let seed = TargetSeed::with_baseline("src/a.c", 5, baseline).unwrap();
        let target = TargetFile::from_seed(seed);

        assert_eq!(target.uncovered_units(), 2);
        assert_eq!(target.uncovered().iter().collect::<Vec<_>>(), vec![3, 4]);
        assert!(!target.is_fully_covered());
    }

    #[test]
    fn test_zero_unit_target_is_fully_covered() {
        let target = TargetFile::from_seed(TargetSeed::new("empty.c", 0));
        assert!(target.is_fully_covered());
    }

    #[test]
    fn test_id_ordering_is_lexicographic() {
        let a = TargetId::new("src/a.c");
        let b = TargetId::new("src/b.c");
        assert!(a < b);
    }
}
