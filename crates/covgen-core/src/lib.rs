//! # covgen-core
//!
//! Core coverage data model for coverage-guided snippet generation.
//!
//! The model is deliberately small and single-writer:
//!
//! - [`UnitSet`] — an ordered set of coverage units (lines or branches).
//!   Union is commutative and idempotent, which makes merges safe in any
//!   completion order.
//! - [`TargetFile`] — per-target coverage record. The covered set only ever
//!   grows over the life of a run.
//! - [`CoverageModel`] — owns all target records and is the only place
//!   coverage reports are merged. Callers other than the run orchestrator
//!   hold it read-only.
//! - [`CoverageSource`] — supplies initial totals and an optional covered
//!   baseline before a run starts (e.g. from a fastcov report).
//!
//! Nothing in this crate performs I/O or knows about any target output
//! format; report parsing lives in `covgen-report`, the generation loop in
//! `covgen-engine`.

pub mod coverage;
pub mod error;
pub mod source;
pub mod target;
pub mod unit;

pub use coverage::{CoverageDelta, CoverageModel, CoverageReport, Gap};
pub use error::CoverageError;
pub use source::CoverageSource;
pub use target::{TargetFile, TargetId, TargetSeed};
pub use unit::UnitSet;
