//! # covgen-report
//!
//! fastcov JSON coverage adapter.
//!
//! Parses the raw fastcov report shape
//!
//! ```json
//! {
//!   "sources": {
//!     "src/foo.c": {
//!       "": {
//!         "branches": { "12": [1, 0] },
//!         "functions": { "foo": { "execution_count": 0, "start_line": 10 } },
//!         "lines": { "10": 3, "11": 0 }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! into per-file coverage with integer line keys, and bridges it to the
//! `covgen-core` model: instrumented lines become coverage units (unit
//! index = rank of the line among the file's instrumented lines), lines
//! with a non-zero hit count become the covered baseline.
//!
//! Also hosts the selection-side queries the CLI exposes: coverage
//! percentage, low-coverage band filtering, and zero-coverage function
//! extraction.

pub mod fastcov;

pub use fastcov::{
    coverage_percent, load_fastcov, low_coverage_files, parse_fastcov, seeds,
    zero_coverage_functions, Coverage, FastcovSource, FileCoverage, FunctionCoverage,
    LowCoverageFile, RawCoverage, ReportError, UncoveredFunction,
};
