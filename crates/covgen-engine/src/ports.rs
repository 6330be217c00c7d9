//! Collaborator ports consumed by the loop.
//!
//! The engine calls into these narrow interfaces and holds no logic of
//! its own behind them: text generation is an arbitrary stochastic
//! network service, verification is whatever "valid" means for the target
//! output format.

use async_trait::async_trait;

use covgen_core::{TargetId, UnitSet};

/// One generation request, fully rendered.
///
/// Prompt text is built by the [`crate::prompt::PromptBuilder`] before the
/// port is invoked, so implementations only transport it.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Target the candidate should exercise.
    pub target: TargetId,
    /// 0-based attempt index within the current cycle.
    pub attempt: u32,
    /// System prompt.
    pub system: String,
    /// User prompt (initial, or feedback carrying the prior diagnostic).
    pub prompt: String,
}

/// Generation failures, split by how the loop must react.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeneratorError {
    /// Timeouts, rate limits: retried within the transient sub-budget.
    #[error("transient generator error: {0}")]
    Transient(String),

    /// Invalid configuration, permanent backend rejection: exhausts the
    /// attempt cycle immediately.
    #[error("terminal generator error: {0}")]
    Terminal(String),
}

/// Text-generation backend port.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce candidate source text for one attempt.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, GeneratorError>;
}

/// Verdict of the verification procedure on one candidate.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// Candidate is valid and exercises these coverage units.
    Valid(UnitSet),
    /// Candidate was rejected; the diagnostic feeds the next prompt.
    Invalid(String),
}

/// Verification port.
///
/// Rejection is an expected, recoverable outcome and therefore part of the
/// verdict rather than an error channel.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Judge one candidate for one target.
    async fn verify(&self, target: &TargetId, text: &str) -> Verdict;
}
