//! The bounded generate → verify → feedback cycle for one target.
//!
//! Runs the retry state machine
//!
//! ```text
//! Pending -> Generating -> Verifying -> { Accepted | Retrying | Exhausted }
//! ```
//!
//! and reports exactly one terminal outcome per invocation. Coverage
//! merging is deliberately left to the caller so the coverage model keeps
//! a single writer.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use covgen_core::{TargetId, UnitSet};

use crate::config::RunConfig;
use crate::ports::{GenerateRequest, Generator, GeneratorError, Verdict, Verifier};
use crate::prompt::{strip_code_fences, PromptBuilder, PromptContext};
use crate::state::CancelFlag;

/// Immutable view of a target captured when its cycle is spawned.
#[derive(Debug, Clone)]
pub struct TargetSnapshot {
    /// Target identifier.
    pub id: TargetId,
    /// Total measurable units.
    pub total_units: u32,
    /// Units uncovered at cycle start.
    pub uncovered: UnitSet,
}

/// One generation try within a cycle. Created once, never mutated.
#[derive(Debug, Clone)]
pub struct SnippetAttempt {
    /// 0-based attempt index.
    pub index: u32,
    /// Candidate text after fence stripping.
    pub text: String,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
    /// Wall-clock duration of the attempt.
    pub duration: Duration,
}

/// Outcome of a single attempt (not of the whole cycle).
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// Candidate passed verification.
    Accepted,
    /// Candidate was rejected with this diagnostic.
    Rejected(String),
    /// Generator produced empty text.
    Empty,
}

/// A candidate that passed verification.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedSnippet {
    /// Target the snippet exercises.
    pub target: TargetId,
    /// The accepted text.
    pub text: String,
    /// Coverage units the snippet exercises.
    pub units: UnitSet,
    /// Generation attempts the cycle used (1-based count).
    pub attempts: u32,
}

/// Terminal outcome of one attempt cycle.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// A candidate was accepted.
    Accepted(AcceptedSnippet),
    /// The retry budget ran out; carries the latest diagnostic.
    Exhausted {
        target: TargetId,
        diagnostic: String,
        attempts: u32,
    },
    /// The run-level cancel flag fired before the next generation call.
    /// The caller discards this: the target is neither merged nor marked
    /// exhausted.
    Cancelled { target: TargetId, attempts: u32 },
}

impl CycleOutcome {
    /// Target the cycle ran on.
    #[must_use]
    pub fn target(&self) -> &TargetId {
        match self {
            CycleOutcome::Accepted(snippet) => &snippet.target,
            CycleOutcome::Exhausted { target, .. } | CycleOutcome::Cancelled { target, .. } => {
                target
            }
        }
    }
}

/// Full result of one cycle: the terminal outcome plus the per-attempt
/// history (kept for logging; only the outcome survives the cycle).
#[derive(Debug)]
pub struct CycleResult {
    pub outcome: CycleOutcome,
    pub history: Vec<SnippetAttempt>,
    pub duration: Duration,
}

/// How a generation phase ended without producing text.
enum GenerateAbort {
    Terminal(String),
    TransientBudgetExhausted(String),
    Cancelled,
}

/// Runs the bounded retry state machine for exactly one target.
pub struct AttemptController {
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn Verifier>,
    prompts: Arc<dyn PromptBuilder>,
    config: RunConfig,
}

impl AttemptController {
    /// Controller over the given collaborator ports.
    #[must_use]
    pub fn new(
        generator: Arc<dyn Generator>,
        verifier: Arc<dyn Verifier>,
        prompts: Arc<dyn PromptBuilder>,
        config: RunConfig,
    ) -> Self {
        Self {
            generator,
            verifier,
            prompts,
            config,
        }
    }

    /// Run one full cycle for `target`.
    ///
    /// Invokes the generator at most `max_attempts_per_target` times
    /// (transient retries aside) and always reaches exactly one terminal
    /// outcome. The only retained inter-attempt fact is the latest failure
    /// diagnostic, folded into the next feedback prompt.
    pub async fn run(&self, target: TargetSnapshot, cancel: CancelFlag) -> CycleResult {
        let cycle_start = Instant::now();
        let mut history: Vec<SnippetAttempt> = Vec::new();
        // Previous candidate text and its diagnostic, for the feedback prompt.
        let mut last_failure: Option<(String, String)> = None;
        let mut attempts_made = 0u32;

        for attempt in 0..self.config.max_attempts_per_target {
            if cancel.is_cancelled() {
                debug!(target = %target.id, attempt, "cycle cancelled before generation");
                return CycleResult {
                    outcome: CycleOutcome::Cancelled {
                        target: target.id,
                        attempts: attempts_made,
                    },
                    history,
                    duration: cycle_start.elapsed(),
                };
            }

            let ctx = PromptContext {
                target: &target.id,
                total_units: target.total_units,
                uncovered: &target.uncovered,
                attempt,
            };
            let prompt = match &last_failure {
                Some((previous, diagnostic)) => self.prompts.feedback(&ctx, previous, diagnostic),
                None => self.prompts.initial(&ctx),
            };
            let request = GenerateRequest {
                target: target.id.clone(),
                attempt,
                system: self.prompts.system(&ctx),
                prompt,
            };

            let attempt_start = Instant::now();
            debug!(target = %target.id, attempt, "requesting candidate");

            let raw = match self.generate_with_retry(&request, &cancel).await {
                Ok(raw) => raw,
                Err(GenerateAbort::Cancelled) => {
                    return CycleResult {
                        outcome: CycleOutcome::Cancelled {
                            target: target.id,
                            attempts: attempts_made,
                        },
                        history,
                        duration: cycle_start.elapsed(),
                    };
                }
                Err(GenerateAbort::Terminal(message))
                | Err(GenerateAbort::TransientBudgetExhausted(message)) => {
                    warn!(target = %target.id, attempt, %message, "generator gave up");
                    return CycleResult {
                        outcome: CycleOutcome::Exhausted {
                            target: target.id,
                            diagnostic: message,
                            attempts: attempts_made,
                        },
                        history,
                        duration: cycle_start.elapsed(),
                    };
                }
            };

            attempts_made += 1;
            let text = strip_code_fences(&raw);

            if text.is_empty() {
                // Empty output: count the attempt but restart from the
                // initial prompt rather than feeding back nothing.
                warn!(target = %target.id, attempt, "generator returned empty text");
                history.push(SnippetAttempt {
                    index: attempt,
                    text,
                    outcome: AttemptOutcome::Empty,
                    duration: attempt_start.elapsed(),
                });
                last_failure = None;
                continue;
            }

            match self.verifier.verify(&target.id, &text).await {
                Verdict::Valid(units) => {
                    info!(
                        target = %target.id,
                        attempt,
                        units = units.len(),
                        "candidate accepted"
                    );
                    history.push(SnippetAttempt {
                        index: attempt,
                        text: text.clone(),
                        outcome: AttemptOutcome::Accepted,
                        duration: attempt_start.elapsed(),
                    });
                    return CycleResult {
                        outcome: CycleOutcome::Accepted(AcceptedSnippet {
                            target: target.id,
                            text,
                            units,
                            attempts: attempts_made,
                        }),
                        history,
                        duration: cycle_start.elapsed(),
                    };
                }
                Verdict::Invalid(diagnostic) => {
                    warn!(target = %target.id, attempt, %diagnostic, "candidate rejected");
                    history.push(SnippetAttempt {
                        index: attempt,
                        text: text.clone(),
                        outcome: AttemptOutcome::Rejected(diagnostic.clone()),
                        duration: attempt_start.elapsed(),
                    });
                    last_failure = Some((text, diagnostic));
                }
            }
        }

        let diagnostic = last_failure
            .map(|(_, diagnostic)| diagnostic)
            .unwrap_or_else(|| "generator produced no usable candidate".to_string());

        CycleResult {
            outcome: CycleOutcome::Exhausted {
                target: target.id,
                diagnostic,
                attempts: attempts_made,
            },
            history,
            duration: cycle_start.elapsed(),
        }
    }

    /// Invoke the generator, retrying transient failures with exponential
    /// backoff inside the sub-budget. Terminal failures and an exhausted
    /// sub-budget abort the whole cycle.
    async fn generate_with_retry(
        &self,
        request: &GenerateRequest,
        cancel: &CancelFlag,
    ) -> Result<String, GenerateAbort> {
        let mut last_message = String::new();

        for retry in 0..self.config.transient_retry_budget {
            if retry > 0 {
                let delay = self.config.transient_backoff(retry - 1);
                warn!(
                    target = %request.target,
                    retry,
                    ?delay,
                    "transient generator failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }

            if cancel.is_cancelled() {
                return Err(GenerateAbort::Cancelled);
            }

            match self.generator.generate(request).await {
                Ok(text) => return Ok(text),
                Err(GeneratorError::Transient(message)) => last_message = message,
                Err(GeneratorError::Terminal(message)) => {
                    return Err(GenerateAbort::Terminal(message));
                }
            }
        }

        Err(GenerateAbort::TransientBudgetExhausted(format!(
            "transient retry budget exhausted: {last_message}"
        )))
    }
}
