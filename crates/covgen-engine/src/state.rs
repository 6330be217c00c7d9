//! Run-scoped mutable state and the cancellation flag.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use covgen_core::{CoverageModel, TargetId};

/// Run-level cancellation signal.
///
/// Checked at every attempt state transition: once fired, no new external
/// calls are started, and results of calls already in flight are discarded
/// rather than merged.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Fresh, unfired flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the flag. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the flag has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Process-wide state for one session.
///
/// Owned exclusively by the run orchestrator; attempt cycles only ever see
/// immutable snapshots taken from it. The exhausted set and the coverage
/// model are the only mutable shared facts of a run, and both are written
/// from this single owner.
#[derive(Debug)]
pub struct RunState {
    model: CoverageModel,
    exhausted: BTreeSet<TargetId>,
    in_flight: BTreeSet<TargetId>,
}

impl RunState {
    /// State over a freshly seeded model.
    #[must_use]
    pub fn new(model: CoverageModel) -> Self {
        Self {
            model,
            exhausted: BTreeSet::new(),
            in_flight: BTreeSet::new(),
        }
    }

    /// Read-only coverage model.
    #[must_use]
    pub fn model(&self) -> &CoverageModel {
        &self.model
    }

    /// Mutable coverage model. Orchestrator-only.
    pub fn model_mut(&mut self) -> &mut CoverageModel {
        &mut self.model
    }

    /// Mark a target as out of retries for the rest of the run.
    pub fn mark_exhausted(&mut self, id: TargetId) {
        self.in_flight.remove(&id);
        self.exhausted.insert(id);
    }

    /// Whether the target has been marked exhausted.
    #[must_use]
    pub fn is_exhausted(&self, id: &TargetId) -> bool {
        self.exhausted.contains(id)
    }

    /// Exhausted targets in identifier order.
    pub fn exhausted(&self) -> impl Iterator<Item = &TargetId> {
        self.exhausted.iter()
    }

    /// Reserve a target for an attempt cycle (exclusivity invariant:
    /// never two cycles on the same target concurrently).
    pub fn begin_attempt(&mut self, id: TargetId) {
        let inserted = self.in_flight.insert(id);
        debug_assert!(inserted, "target already has a cycle in flight");
    }

    /// Release a target's in-flight reservation.
    pub fn finish_attempt(&mut self, id: &TargetId) {
        let removed = self.in_flight.remove(id);
        debug_assert!(removed, "target had no cycle in flight");
    }

    /// Whether a cycle is currently running for the target.
    #[must_use]
    pub fn is_in_flight(&self, id: &TargetId) -> bool {
        self.in_flight.contains(id)
    }

    /// Number of cycles currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covgen_core::TargetSeed;

    fn state() -> RunState {
        let model = CoverageModel::from_seeds(vec![TargetSeed::new("a.c", 5)]).unwrap();
        RunState::new(model)
    }

    #[test]
    fn test_cancel_flag_is_sticky_and_shared() {
        let flag = CancelFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_cancelled());

        flag.cancel();
        assert!(observer.is_cancelled());
        flag.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_in_flight_tracking() {
        let mut state = state();
        let id = TargetId::new("a.c");

        state.begin_attempt(id.clone());
        assert!(state.is_in_flight(&id));
        assert_eq!(state.in_flight_count(), 1);

        state.finish_attempt(&id);
        assert!(!state.is_in_flight(&id));
    }

    #[test]
    fn test_exhausted_clears_in_flight() {
        let mut state = state();
        let id = TargetId::new("a.c");

        state.begin_attempt(id.clone());
        state.mark_exhausted(id.clone());
        assert!(state.is_exhausted(&id));
        assert!(!state.is_in_flight(&id));
    }
}
