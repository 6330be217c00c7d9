//! The session loop.
//!
//! Repeatedly asks the selector for the next target, runs an attempt cycle
//! for it (up to `concurrency` cycles in flight, each on a distinct
//! target), and folds results back into the coverage model. All writes to
//! the model and the exhausted set happen here, on one task, so merges are
//! conflict-free no matter how cycles interleave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use covgen_core::{CoverageError, CoverageModel, CoverageReport, CoverageSource, TargetId};

use crate::attempt::{AcceptedSnippet, AttemptController, CycleOutcome, CycleResult, TargetSnapshot};
use crate::config::{ConfigError, RunConfig};
use crate::ports::{Generator, Verifier};
use crate::prompt::PromptBuilder;
use crate::selector::SeedSelector;
use crate::state::{CancelFlag, RunState};

/// Why the run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Every target is fully covered or exhausted.
    Completed,
    /// The wall-clock budget ran out with work still selectable.
    BudgetExhausted,
    /// The run-level cancellation signal fired.
    Cancelled,
}

/// Final per-target coverage line in the summary.
#[derive(Debug, Clone, Serialize)]
pub struct TargetCoverage {
    pub target: TargetId,
    pub covered: u32,
    pub total: u32,
}

/// What a run produced.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// Accepted snippets in completion order.
    pub accepted: Vec<AcceptedSnippet>,
    /// Final coverage per target, in identifier order.
    pub coverage: Vec<TargetCoverage>,
    /// Targets that ran out of retries, in identifier order.
    pub exhausted: Vec<TargetId>,
    /// Why the loop stopped.
    pub stop_reason: StopReason,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

/// Errors raised before the loop starts; per-target failures never abort
/// a running session.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no targets to attempt")]
    NoTargets,

    #[error(transparent)]
    Coverage(#[from] CoverageError),
}

/// Drives the overall session.
pub struct RunOrchestrator {
    controller: Arc<AttemptController>,
    selector: SeedSelector,
    config: RunConfig,
    cancel: CancelFlag,
}

impl RunOrchestrator {
    /// Orchestrator over the given collaborator ports.
    #[must_use]
    pub fn new(
        generator: Arc<dyn Generator>,
        verifier: Arc<dyn Verifier>,
        prompts: Arc<dyn PromptBuilder>,
        config: RunConfig,
    ) -> Self {
        let controller = Arc::new(AttemptController::new(
            generator,
            verifier,
            prompts,
            config.clone(),
        ));
        Self {
            controller,
            selector: SeedSelector::new(),
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Replace the default selection policy.
    #[must_use]
    pub fn with_selector(mut self, selector: SeedSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Handle callers can fire to stop the run cleanly. In-flight cycles
    /// finish and their results are discarded.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run a full session over the targets the source supplies.
    pub async fn run(&self, source: &dyn CoverageSource) -> Result<RunSummary, RunError> {
        self.config.validate()?;

        let seeds = source.targets()?;
        if seeds.is_empty() {
            return Err(RunError::NoTargets);
        }
        let model = CoverageModel::from_seeds(seeds)?;

        let started = Instant::now();
        let deadline = self.config.wall_clock_budget.map(|budget| started + budget);
        let mut state = RunState::new(model);
        let mut accepted: Vec<AcceptedSnippet> = Vec::new();

        let mut cycles: JoinSet<CycleResult> = JoinSet::new();
        let mut cycle_targets: HashMap<tokio::task::Id, TargetId> = HashMap::new();

        info!(
            targets = state.model().len(),
            concurrency = self.config.concurrency,
            max_attempts = self.config.max_attempts_per_target,
            "run started"
        );

        loop {
            let budget_over = deadline.is_some_and(|d| Instant::now() >= d);

            // Fill the pool. After cancellation or budget exhaustion no new
            // cycles start; in-flight ones are drained below.
            if !budget_over && !self.cancel.is_cancelled() {
                while cycles.len() < self.config.concurrency {
                    let Some(id) = self.selector.next(&state) else {
                        break;
                    };
                    let Some(snapshot) = snapshot_of(&state, &id) else {
                        // A target the model does not know cannot be
                        // attempted; exhaust it so selection moves on.
                        error!(target = %id, "selected target missing from model");
                        state.mark_exhausted(id);
                        continue;
                    };
                    state.begin_attempt(id.clone());
                    debug!(target = %id, "cycle spawned");

                    let controller = Arc::clone(&self.controller);
                    let cancel = self.cancel.clone();
                    let handle =
                        cycles.spawn(async move { controller.run(snapshot, cancel).await });
                    cycle_targets.insert(handle.id(), id);
                }
            }

            let Some(joined) = cycles.join_next_with_id().await else {
                break;
            };

            match joined {
                Ok((task_id, result)) => {
                    cycle_targets.remove(&task_id);
                    self.fold(&mut state, result, &mut accepted);
                }
                Err(join_error) => {
                    // A panicked cycle must not wedge its target in the
                    // in-flight set.
                    if let Some(id) = cycle_targets.remove(&join_error.id()) {
                        error!(target = %id, %join_error, "attempt cycle failed");
                        state.finish_attempt(&id);
                        state.mark_exhausted(id);
                    } else {
                        error!(%join_error, "attempt cycle failed for unknown target");
                    }
                }
            }
        }

        let stop_reason = if self.cancel.is_cancelled() {
            StopReason::Cancelled
        } else if deadline.is_some_and(|d| Instant::now() >= d) && self.selector.next(&state).is_some()
        {
            StopReason::BudgetExhausted
        } else {
            StopReason::Completed
        };

        let summary = RunSummary {
            accepted,
            coverage: state
                .model()
                .targets()
                .map(|t| TargetCoverage {
                    target: t.id.clone(),
                    covered: t.covered.len(),
                    total: t.total_units,
                })
                .collect(),
            exhausted: state.exhausted().cloned().collect(),
            stop_reason,
            duration: started.elapsed(),
        };

        info!(
            accepted = summary.accepted.len(),
            exhausted = summary.exhausted.len(),
            reason = ?summary.stop_reason,
            "run finished"
        );

        Ok(summary)
    }

    /// Fold one finished cycle into the run state. The only place coverage
    /// merges and exhausted markings happen.
    fn fold(&self, state: &mut RunState, result: CycleResult, accepted: &mut Vec<AcceptedSnippet>) {
        let target = result.outcome.target().clone();
        state.finish_attempt(&target);

        if self.cancel.is_cancelled() {
            // Whatever the in-flight cycle produced after cancellation is
            // discarded rather than merged.
            debug!(target = %target, "discarding post-cancellation result");
            return;
        }

        match result.outcome {
            CycleOutcome::Accepted(snippet) => {
                let report = CoverageReport::new(
                    target.clone(),
                    snippet.units.clone(),
                    format!("{}#attempt-{}", target, snippet.attempts),
                );
                match state.model_mut().merge(&report) {
                    Ok(delta) => {
                        info!(
                            target = %target,
                            new_units = delta.new_units,
                            covered = delta.covered_total,
                            "coverage merged"
                        );
                        state.model_mut().record_attempt(&target, delta.new_units > 0);
                        if delta.new_units == 0 {
                            self.check_stall(state, &target);
                        }
                        accepted.push(snippet);
                    }
                    Err(e) => {
                        // Malformed unit data from the verifier side: drop
                        // this update, keep the run going.
                        warn!(target = %target, error = %e, "invalid coverage report dropped");
                        state.model_mut().record_attempt(&target, false);
                        self.check_stall(state, &target);
                    }
                }
            }
            CycleOutcome::Exhausted {
                diagnostic,
                attempts,
                ..
            } => {
                warn!(target = %target, attempts, %diagnostic, "target exhausted");
                state.model_mut().record_attempt(&target, false);
                state.mark_exhausted(target);
            }
            CycleOutcome::Cancelled { .. } => {
                debug!(target = %target, "cycle cancelled, result discarded");
            }
        }
    }

    /// Exhaust targets whose accepted cycles keep adding nothing, so the
    /// loop cannot spin on a target that no longer yields coverage.
    fn check_stall(&self, state: &mut RunState, target: &TargetId) {
        let stalls = state
            .model()
            .target(target)
            .map_or(0, |t| t.consecutive_failures);
        if stalls >= self.config.max_stalls {
            warn!(target = %target, stalls, "target stalled, marking exhausted");
            state.mark_exhausted(target.clone());
        }
    }
}

fn snapshot_of(state: &RunState, id: &TargetId) -> Option<TargetSnapshot> {
    let target = state.model().target(id)?;
    Some(TargetSnapshot {
        id: target.id.clone(),
        total_units: target.total_units,
        uncovered: target.uncovered(),
    })
}
