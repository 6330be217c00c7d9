//! fastcov JSON parsing and coverage queries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use covgen_core::{CoverageError, CoverageSource, TargetSeed, UnitSet};

/// Highest meaningful coverage percentage.
pub const COVERAGE_MAX: f64 = 100.0;

/// Errors raised while loading or interpreting a fastcov report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to read coverage file: {0}")]
    Io(#[from] std::io::Error),

    #[error("coverage file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bad line key {key:?} in coverage for {path}")]
    BadLineKey { path: String, key: String },

    #[error("threshold {0} outside 0..=100")]
    ThresholdOutOfRange(f64),

    #[error("min threshold {min} must be below threshold {max}")]
    ThresholdBandEmpty { min: f64, max: f64 },
}

/// Raw per-function entry as fastcov emits it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFunction {
    pub execution_count: u64,
    pub start_line: u32,
}

/// Raw per-file entry: string keys, untyped sections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFileCoverage {
    #[serde(default)]
    pub branches: BTreeMap<String, Vec<u64>>,
    #[serde(default)]
    pub functions: BTreeMap<String, RawFunction>,
    #[serde(default)]
    pub lines: BTreeMap<String, u64>,
}

/// Raw fastcov document. Each source maps to a single-entry object keyed
/// by the empty string (a fastcov quirk).
#[derive(Debug, Clone, Deserialize)]
pub struct RawCoverage {
    pub sources: BTreeMap<String, BTreeMap<String, RawFileCoverage>>,
}

/// Per-function coverage with typed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCoverage {
    pub execution_count: u64,
    pub start_line: u32,
}

/// Per-file coverage with integer line keys.
#[derive(Debug, Clone, Default)]
pub struct FileCoverage {
    /// Branch line -> per-arm hit counts.
    pub branches: BTreeMap<u32, Vec<u64>>,
    /// Function name -> coverage.
    pub functions: BTreeMap<String, FunctionCoverage>,
    /// Instrumented line -> hit count.
    pub lines: BTreeMap<u32, u64>,
}

impl FileCoverage {
    /// Instrumented lines in ascending order. The position of a line in
    /// this list is its coverage unit index.
    #[must_use]
    pub fn instrumented_lines(&self) -> Vec<u32> {
        self.lines.keys().copied().collect()
    }

    /// Unit indices of lines with a non-zero hit count.
    #[must_use]
    pub fn covered_units(&self) -> UnitSet {
        self.lines
            .values()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(unit, _)| unit as u32)
            .collect()
    }
}

/// Structured coverage: source path -> file coverage, path-ordered.
pub type Coverage = BTreeMap<String, FileCoverage>;

/// Convert raw fastcov data into the structured form.
///
/// String line keys are parsed to integers; a non-numeric key is a
/// malformed report, not a recoverable condition.
pub fn parse_fastcov(raw: &RawCoverage) -> Result<Coverage, ReportError> {
    let mut coverage = Coverage::new();

    for (path, wrapper) in &raw.sources {
        // fastcov nests each file under a "" test-name key.
        let Some(file_info) = wrapper.get("") else {
            continue;
        };

        let mut file = FileCoverage::default();

        for (key, arms) in &file_info.branches {
            let line = parse_line_key(path, key)?;
            file.branches.insert(line, arms.clone());
        }

        for (name, function) in &file_info.functions {
            file.functions.insert(
                name.clone(),
                FunctionCoverage {
                    execution_count: function.execution_count,
                    start_line: function.start_line,
                },
            );
        }

        for (key, count) in &file_info.lines {
            let line = parse_line_key(path, key)?;
            file.lines.insert(line, *count);
        }

        coverage.insert(path.clone(), file);
    }

    Ok(coverage)
}

fn parse_line_key(path: &str, key: &str) -> Result<u32, ReportError> {
    key.parse().map_err(|_| ReportError::BadLineKey {
        path: path.to_string(),
        key: key.to_string(),
    })
}

/// Load and parse a fastcov JSON file.
pub fn load_fastcov(path: &Path) -> Result<Coverage, ReportError> {
    let data = std::fs::read_to_string(path)?;
    let raw: RawCoverage = serde_json::from_str(&data)?;
    parse_fastcov(&raw)
}

/// Line coverage percentage for one file.
///
/// A file with no instrumented lines counts as fully covered; there is
/// nothing left to exercise in it.
#[must_use]
pub fn coverage_percent(file: &FileCoverage) -> f64 {
    if file.lines.is_empty() {
        return COVERAGE_MAX;
    }
    let covered = file.lines.values().filter(|count| **count > 0).count();
    covered as f64 / file.lines.len() as f64 * COVERAGE_MAX
}

/// A file whose line coverage falls inside the requested band.
#[derive(Debug, Clone, PartialEq)]
pub struct LowCoverageFile {
    pub path: String,
    pub percent: f64,
}

/// Files with coverage in `[min_threshold, threshold)`, worst first.
///
/// Ties are broken by path so the output is reproducible.
pub fn low_coverage_files(
    coverage: &Coverage,
    threshold: f64,
    min_threshold: f64,
) -> Result<Vec<LowCoverageFile>, ReportError> {
    for value in [threshold, min_threshold] {
        if !(0.0..=COVERAGE_MAX).contains(&value) {
            return Err(ReportError::ThresholdOutOfRange(value));
        }
    }
    if min_threshold >= threshold {
        return Err(ReportError::ThresholdBandEmpty {
            min: min_threshold,
            max: threshold,
        });
    }

    let mut files: Vec<LowCoverageFile> = coverage
        .iter()
        .map(|(path, file)| LowCoverageFile {
            path: path.clone(),
            percent: coverage_percent(file),
        })
        .filter(|f| f.percent >= min_threshold && f.percent < threshold)
        .collect();

    files.sort_by(|a, b| {
        a.percent
            .partial_cmp(&b.percent)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });

    Ok(files)
}

/// A function the instrumented run never entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncoveredFunction {
    pub path: String,
    pub name: String,
    pub start_line: u32,
}

/// Functions with an execution count of zero, in (path, name) order.
#[must_use]
pub fn zero_coverage_functions(coverage: &Coverage) -> Vec<UncoveredFunction> {
    let mut functions = Vec::new();
    for (path, file) in coverage {
        for (name, function) in &file.functions {
            if function.execution_count == 0 {
                functions.push(UncoveredFunction {
                    path: path.clone(),
                    name: name.clone(),
                    start_line: function.start_line,
                });
            }
        }
    }
    functions
}

/// Target seeds from parsed coverage.
///
/// Each source file becomes one target: total units = instrumented line
/// count, baseline = units whose line had a non-zero hit count.
pub fn seeds(coverage: &Coverage) -> Result<Vec<TargetSeed>, CoverageError> {
    coverage
        .iter()
        .map(|(path, file)| {
            TargetSeed::with_baseline(path.as_str(), file.lines.len() as u32, file.covered_units())
        })
        .collect()
}

/// [`CoverageSource`] over a fastcov JSON file.
#[derive(Debug, Clone)]
pub struct FastcovSource {
    path: PathBuf,
}

impl FastcovSource {
    /// Source backed by the report at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CoverageSource for FastcovSource {
    fn targets(&self) -> Result<Vec<TargetSeed>, CoverageError> {
        let coverage =
            load_fastcov(&self.path).map_err(|e| CoverageError::SourceFailed(e.to_string()))?;
        seeds(&coverage)
    }
}
