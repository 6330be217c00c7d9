//! # covgen-engine
//!
//! The coverage-guided generation-and-verification loop.
//!
//! The engine repeatedly picks the target file with the most promising
//! coverage gap, drives a bounded generate → verify → feedback cycle for
//! it against injected collaborator ports, and folds accepted coverage
//! back into the model that drives the next pick.
//!
//! ```text
//! ┌──────────────┐  next target   ┌──────────────┐
//! │ SeedSelector │ ─────────────> │   Attempt    │
//! │ (gap ranking)│                │  Controller  │
//! └──────▲───────┘                └──────┬───────┘
//!        │                               │ generate / verify
//!        │                        ┌──────▼───────┐
//!        │                        │  Generator / │  (injected ports,
//!        │                        │  Verifier    │   external services)
//!        │                        └──────┬───────┘
//!        │     merge accepted coverage   │
//! ┌──────┴───────┐                ┌──────▼───────┐
//! │ CoverageModel│ <───────────── │ Orchestrator │
//! │ (single      │                │ (session     │
//! │  writer)     │                │  loop)       │
//! └──────────────┘                └──────────────┘
//! ```
//!
//! The engine knows nothing about any target output grammar and ships no
//! model client: the [`Generator`](ports::Generator) and
//! [`Verifier`](ports::Verifier) ports are the only way candidate text is
//! produced or judged, and the [`PromptBuilder`](prompt::PromptBuilder) is
//! a pure, swappable formatting layer.
//!
//! Coverage merges happen in exactly one place (the orchestrator), so each
//! target's covered set only ever grows regardless of how concurrently
//! completing cycles interleave.

pub mod attempt;
pub mod config;
pub mod orchestrator;
pub mod ports;
pub mod prompt;
pub mod selector;
pub mod state;

pub use attempt::{
    AcceptedSnippet, AttemptController, AttemptOutcome, CycleOutcome, CycleResult, SnippetAttempt,
    TargetSnapshot,
};
pub use config::{ConfigError, RunConfig};
pub use orchestrator::{RunError, RunOrchestrator, RunSummary, StopReason, TargetCoverage};
pub use ports::{GenerateRequest, Generator, GeneratorError, Verdict, Verifier};
pub use prompt::{strip_code_fences, PromptBuilder, PromptContext, TextPromptBuilder};
pub use selector::{ScorePolicy, SeedSelector, SizeWeightedPolicy};
pub use state::{CancelFlag, RunState};
