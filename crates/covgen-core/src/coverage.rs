//! The coverage model and report merging.
//!
//! The model is the single owner of all per-target coverage state. Only the
//! run orchestrator mutates it (merges and attempt bookkeeping); everything
//! else queries it read-only. That single-writer discipline plus set-union
//! merge semantics keep coverage monotone and replays deterministic given a
//! fixed sequence of accepted snippets.

use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::error::CoverageError;
use crate::target::{TargetFile, TargetId, TargetSeed};
use crate::unit::UnitSet;

/// Immutable snapshot of coverage observed for one target.
///
/// Tagged with the origin of the measurement (which accepted snippet
/// produced it) and a creation timestamp. Reports are created once and
/// never mutated; the [`CoverageModel`] is the only consumer that merges
/// them.
#[derive(Debug, Clone)]
pub struct CoverageReport {
    /// Target the measurement belongs to.
    pub target: TargetId,
    /// Units observed covered.
    pub units: UnitSet,
    /// Which accepted snippet produced the measurement.
    pub origin: String,
    /// When the report was created.
    pub created_at: SystemTime,
}

impl CoverageReport {
    /// Create a report tagged with its origin.
    #[must_use]
    pub fn new(target: TargetId, units: UnitSet, origin: impl Into<String>) -> Self {
        Self {
            target,
            units,
            origin: origin.into(),
            created_at: SystemTime::now(),
        }
    }
}

/// What a merge actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageDelta {
    /// Units newly covered by this merge.
    pub new_units: u32,
    /// Covered units after the merge.
    pub covered_total: u32,
}

/// Coverage gap for one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    /// Units not yet covered.
    pub uncovered: u32,
    /// Total declared units.
    pub total: u32,
    /// `uncovered / total` in `[0, 1]`; 0 for zero-unit targets.
    pub ratio: f64,
}

/// Holds per-file coverage facts and answers gap queries.
#[derive(Debug, Default)]
pub struct CoverageModel {
    targets: BTreeMap<TargetId, TargetFile>,
}

impl CoverageModel {
    /// Empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from seeds. Fails on duplicate identifiers.
    pub fn from_seeds(seeds: Vec<TargetSeed>) -> Result<Self, CoverageError> {
        let mut targets = BTreeMap::new();
        for seed in seeds {
            let id = seed.id.clone();
            if targets.insert(id.clone(), TargetFile::from_seed(seed)).is_some() {
                return Err(CoverageError::DuplicateTarget(id));
            }
        }
        Ok(Self { targets })
    }

    /// Number of tracked targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the model tracks no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Look up one target record.
    #[must_use]
    pub fn target(&self, id: &TargetId) -> Option<&TargetFile> {
        self.targets.get(id)
    }

    /// All target records in identifier order.
    pub fn targets(&self) -> impl Iterator<Item = &TargetFile> {
        self.targets.values()
    }

    /// Coverage gap for `id`. Pure query, no side effects.
    #[must_use]
    pub fn gap(&self, id: &TargetId) -> Option<Gap> {
        self.targets.get(id).map(|t| {
            let uncovered = t.uncovered_units();
            let ratio = if t.total_units == 0 {
                0.0
            } else {
                f64::from(uncovered) / f64::from(t.total_units)
            };
            Gap {
                uncovered,
                total: t.total_units,
                ratio,
            }
        })
    }

    /// Whether every declared unit of `id` is covered.
    #[must_use]
    pub fn is_fully_covered(&self, id: &TargetId) -> bool {
        self.targets.get(id).is_some_and(TargetFile::is_fully_covered)
    }

    /// Union a report's units into the target's covered set.
    ///
    /// Rejects reports referencing units outside the target's declared
    /// total before touching any state, so a failed merge leaves the model
    /// untouched. Merging the same report twice is a no-op delta.
    pub fn merge(&mut self, report: &CoverageReport) -> Result<CoverageDelta, CoverageError> {
        let target = self
            .targets
            .get_mut(&report.target)
            .ok_or_else(|| CoverageError::UnknownTarget(report.target.clone()))?;

        if let Some(unit) = report.units.max_unit() {
            if unit >= target.total_units {
                return Err(CoverageError::InvalidReport {
                    target: report.target.clone(),
                    unit,
                    total: target.total_units,
                });
            }
        }

        let new_units = target.covered.count_new(&report.units);
        target.covered.union_with(&report.units);

        Ok(CoverageDelta {
            new_units,
            covered_total: target.covered.len(),
        })
    }

    /// Record that an attempt cycle finished for `id`.
    ///
    /// `gained` is whether the cycle added new covered units; cycles that
    /// gain nothing (rejected candidates, or accepted candidates whose
    /// coverage was already known) bump the consecutive-failure count used
    /// by selection.
    pub fn record_attempt(&mut self, id: &TargetId, gained: bool) {
        if let Some(target) = self.targets.get_mut(id) {
            target.last_attempt = Some(SystemTime::now());
            if gained {
                target.consecutive_failures = 0;
            } else {
                target.consecutive_failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with(id: &str, total: u32) -> CoverageModel {
        CoverageModel::from_seeds(vec![TargetSeed::new(id, total)]).unwrap()
    }

    fn report(id: &str, units: &[u32]) -> CoverageReport {
        CoverageReport::new(
            TargetId::new(id),
            units.iter().copied().collect(),
            "snippet-0",
        )
    }

    #[test]
    fn test_merge_unions_units() {
        let mut model = model_with("a.c", 10);

        let delta = model.merge(&report("a.c", &[0, 1, 2, 3, 4])).unwrap();
        assert_eq!(delta.new_units, 5);
        assert_eq!(delta.covered_total, 5);

        let gap = model.gap(&TargetId::new("a.c")).unwrap();
        assert_eq!(gap.uncovered, 5);
        assert_eq!(gap.total, 10);
        assert!((gap.ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut model = model_with("a.c", 10);
        let rep = report("a.c", &[1, 2, 3]);

        model.merge(&rep).unwrap();
        let covered_once = model.target(&TargetId::new("a.c")).unwrap().covered.clone();

        let delta = model.merge(&rep).unwrap();
        assert_eq!(delta.new_units, 0);
        assert_eq!(
            model.target(&TargetId::new("a.c")).unwrap().covered,
            covered_once
        );
    }

    #[test]
    fn test_merge_is_monotone() {
        let mut model = model_with("a.c", 10);

        let mut covered_len = 0;
        for units in [&[3, 4][..], &[0][..], &[3][..], &[9][..]] {
            model.merge(&report("a.c", units)).unwrap();
            let now = model.target(&TargetId::new("a.c")).unwrap().covered.len();
            assert!(now >= covered_len, "covered set shrank");
            covered_len = now;
        }
    }

    #[test]
    fn test_merge_rejects_out_of_range_units() {
        let mut model = model_with("a.c", 10);

        let err = model.merge(&report("a.c", &[5, 10])).unwrap_err();
        assert!(matches!(
            err,
            CoverageError::InvalidReport { unit: 10, total: 10, .. }
        ));

        // Nothing merged, not even the in-range unit.
        assert_eq!(model.target(&TargetId::new("a.c")).unwrap().covered.len(), 0);
    }

    #[test]
    fn test_merge_rejects_unknown_target() {
        let mut model = model_with("a.c", 10);
        let err = model.merge(&report("b.c", &[0])).unwrap_err();
        assert!(matches!(err, CoverageError::UnknownTarget(_)));
    }

    #[test]
    fn test_duplicate_seed_rejected() {
        let err = CoverageModel::from_seeds(vec![
            TargetSeed::new("a.c", 5),
            TargetSeed::new("a.c", 7),
        ])
        .unwrap_err();
        assert!(matches!(err, CoverageError::DuplicateTarget(_)));
    }

    #[test]
    fn test_record_attempt_tracks_failures() {
        let mut model = model_with("a.c", 10);
        let id = TargetId::new("a.c");

        model.record_attempt(&id, false);
        model.record_attempt(&id, false);
        assert_eq!(model.target(&id).unwrap().consecutive_failures, 2);
        assert!(model.target(&id).unwrap().last_attempt.is_some());

        model.record_attempt(&id, true);
        assert_eq!(model.target(&id).unwrap().consecutive_failures, 0);
    }

    #[test]
    fn test_fully_covered() {
        let mut model = model_with("a.c", 3);
        let id = TargetId::new("a.c");
        assert!(!model.is_fully_covered(&id));

        model.merge(&report("a.c", &[0, 1, 2])).unwrap();
        assert!(model.is_fully_covered(&id));
        assert_eq!(model.gap(&id).unwrap().uncovered, 0);
    }
}
