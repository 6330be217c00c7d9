//! Target selection by coverage gap.

use covgen_core::{TargetFile, TargetId};

use crate::state::RunState;

/// Scoring policy for target selection.
///
/// The exact formula is a tunable policy, not a law: implementations only
/// promise that higher scores mean more attractive targets.
pub trait ScorePolicy: Send + Sync {
    /// Score a candidate target. Higher wins.
    fn score(&self, target: &TargetFile) -> f64;
}

/// Default policy: uncovered ratio weighted by file size, dampened by
/// attempt history.
///
/// The logarithmic size weight keeps large files from starving behind many
/// small nearly-covered ones, and the failure dampening deprioritizes
/// targets whose recent cycles gained nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeWeightedPolicy;

impl ScorePolicy for SizeWeightedPolicy {
    fn score(&self, target: &TargetFile) -> f64 {
        if target.total_units == 0 {
            return 0.0;
        }
        let ratio = f64::from(target.uncovered_units()) / f64::from(target.total_units);
        let weight = f64::from(target.total_units).ln_1p();
        ratio * weight / f64::from(1 + target.consecutive_failures)
    }
}

/// Ranks candidate targets and hands the orchestrator the next one.
pub struct SeedSelector {
    policy: Box<dyn ScorePolicy>,
}

impl Default for SeedSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl SeedSelector {
    /// Selector with the default size-weighted policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(Box::new(SizeWeightedPolicy))
    }

    /// Selector with a custom scoring policy.
    #[must_use]
    pub fn with_policy(policy: Box<dyn ScorePolicy>) -> Self {
        Self { policy }
    }

    /// Next target to attempt, or `None` when every target is fully
    /// covered, exhausted, or already being attempted.
    ///
    /// `None` with nothing in flight is the run's natural termination.
    /// Ties break toward the larger absolute uncovered count, then toward
    /// the smaller identifier, so runs over the same state are
    /// reproducible.
    #[must_use]
    pub fn next(&self, state: &RunState) -> Option<TargetId> {
        state
            .model()
            .targets()
            .filter(|t| {
                !state.is_exhausted(&t.id) && !state.is_in_flight(&t.id) && !t.is_fully_covered()
            })
            .map(|t| (self.policy.score(t), t))
            .max_by(|(score_a, a), (score_b, b)| {
                score_a
                    .partial_cmp(score_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.uncovered_units().cmp(&b.uncovered_units()))
                    // Reversed: the lexicographically smaller id wins ties.
                    .then_with(|| b.id.cmp(&a.id))
            })
            .map(|(_, t)| t.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covgen_core::{CoverageModel, CoverageReport, TargetSeed};

    fn seeded(seeds: Vec<TargetSeed>) -> RunState {
        RunState::new(CoverageModel::from_seeds(seeds).unwrap())
    }

    fn cover(state: &mut RunState, id: &str, units: &[u32]) {
        let report = CoverageReport::new(
            TargetId::new(id),
            units.iter().copied().collect(),
            "test",
        );
        state.model_mut().merge(&report).unwrap();
    }

    #[test]
    fn test_picks_larger_gap_ratio_first() {
        // A: 10 units, 1 covered (gap 0.9). B: 10 units, 7 covered (gap 0.3).
        let mut state = seeded(vec![TargetSeed::new("a.c", 10), TargetSeed::new("b.c", 10)]);
        cover(&mut state, "a.c", &[0]);
        cover(&mut state, "b.c", &[0, 1, 2, 3, 4, 5, 6]);

        let selector = SeedSelector::new();
        assert_eq!(selector.next(&state), Some(TargetId::new("a.c")));
    }

    #[test]
    fn test_never_returns_exhausted_or_full() {
        let mut state = seeded(vec![
            TargetSeed::new("a.c", 4),
            TargetSeed::new("b.c", 4),
            TargetSeed::new("c.c", 4),
        ]);
        state.mark_exhausted(TargetId::new("a.c"));
        cover(&mut state, "b.c", &[0, 1, 2, 3]);

        let selector = SeedSelector::new();
        assert_eq!(selector.next(&state), Some(TargetId::new("c.c")));

        state.mark_exhausted(TargetId::new("c.c"));
        assert_eq!(selector.next(&state), None);
    }

    #[test]
    fn test_skips_targets_in_flight() {
        let state = {
            let mut state = seeded(vec![TargetSeed::new("a.c", 4), TargetSeed::new("b.c", 4)]);
            state.begin_attempt(TargetId::new("a.c"));
            state
        };

        let selector = SeedSelector::new();
        assert_eq!(selector.next(&state), Some(TargetId::new("b.c")));
    }

    #[test]
    fn test_size_breaks_ratio_ties() {
        // Same uncovered ratio; the larger file has more absolute units
        // left and must win.
        let state = seeded(vec![
            TargetSeed::new("small.c", 10),
            TargetSeed::new("large.c", 100),
        ]);

        let selector = SeedSelector::new();
        assert_eq!(selector.next(&state), Some(TargetId::new("large.c")));
    }

    #[test]
    fn test_identifier_breaks_full_ties() {
        struct Flat;
        impl ScorePolicy for Flat {
            fn score(&self, _target: &TargetFile) -> f64 {
                1.0
            }
        }

        let state = seeded(vec![TargetSeed::new("b.c", 10), TargetSeed::new("a.c", 10)]);
        let selector = SeedSelector::with_policy(Box::new(Flat));
        assert_eq!(selector.next(&state), Some(TargetId::new("a.c")));
    }

    #[test]
    fn test_failure_history_dampens_score() {
        let mut state = seeded(vec![TargetSeed::new("a.c", 10), TargetSeed::new("b.c", 10)]);
        // Equal gaps; a.c has stalled twice.
        state.model_mut().record_attempt(&TargetId::new("a.c"), false);
        state.model_mut().record_attempt(&TargetId::new("a.c"), false);

        let selector = SeedSelector::new();
        assert_eq!(selector.next(&state), Some(TargetId::new("b.c")));
    }

    #[test]
    fn test_zero_unit_targets_never_selected() {
        let state = seeded(vec![TargetSeed::new("empty.c", 0)]);
        let selector = SeedSelector::new();
        assert_eq!(selector.next(&state), None);
    }
}
