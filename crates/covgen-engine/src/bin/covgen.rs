//! Coverage analysis CLI.
//!
//! Generation sessions are embedded through the library (the Generator
//! and Verifier ports are injected), so the binary covers the standalone
//! selection-side workflows:
//!
//! ```bash
//! # Rank low-coverage files the way the run selector would attack them
//! covgen analyze --coverage coverage.json --threshold 40
//!
//! # List functions the instrumented run never entered
//! covgen functions --coverage coverage.json
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use covgen_core::TargetFile;
use covgen_engine::{ScorePolicy, SizeWeightedPolicy};
use covgen_report::{low_coverage_files, zero_coverage_functions};

#[derive(Parser)]
#[command(name = "covgen", version, about = "Coverage-guided snippet generation tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank files with low line coverage from a fastcov JSON report.
    Analyze {
        /// Path to the fastcov coverage.json file.
        #[arg(long)]
        coverage: PathBuf,

        /// Upper coverage threshold percentage; files below it are listed.
        #[arg(long, default_value_t = 40.0)]
        threshold: f64,

        /// Lower coverage threshold percentage; files below it are skipped.
        #[arg(long, default_value_t = 0.0)]
        min_threshold: f64,

        /// Show at most this many files.
        #[arg(long)]
        limit: Option<usize>,

        /// Emit machine-readable JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List functions with an execution count of zero.
    Functions {
        /// Path to the fastcov coverage.json file.
        #[arg(long)]
        coverage: PathBuf,

        /// Emit machine-readable JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Analyze {
            coverage,
            threshold,
            min_threshold,
            limit,
            json,
        } => analyze(&coverage, threshold, min_threshold, limit, json),
        Command::Functions { coverage, json } => functions(&coverage, json),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        // Nothing matched; the original tooling treats this as a failed
        // selection, not a silent success.
        Ok(false) => ExitCode::FAILURE,
        Err(message) => {
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}

/// Rank band-filtered low-coverage files by selection score, worst gap
/// first. Returns whether anything matched.
fn analyze(
    coverage_path: &Path,
    threshold: f64,
    min_threshold: f64,
    limit: Option<usize>,
    json: bool,
) -> Result<bool, String> {
    let coverage = covgen_report::load_fastcov(coverage_path).map_err(|e| e.to_string())?;
    let low = low_coverage_files(&coverage, threshold, min_threshold).map_err(|e| e.to_string())?;

    if low.is_empty() {
        eprintln!(
            "No files found with coverage between {min_threshold:.2}% and {threshold:.2}%."
        );
        return Ok(false);
    }

    // Score each candidate the way the run selector would.
    let seeds = covgen_report::seeds(&coverage).map_err(|e| e.to_string())?;
    let policy = SizeWeightedPolicy;
    let mut ranked: Vec<(String, f64, f64)> = low
        .iter()
        .filter_map(|file| {
            let seed = seeds.iter().find(|s| s.id.as_str() == file.path)?;
            let score = policy.score(&TargetFile::from_seed(seed.clone()));
            Some((file.path.clone(), file.percent, score))
        })
        .collect();
    ranked.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }

    if json {
        let rows: Vec<serde_json::Value> = ranked
            .iter()
            .map(|(path, percent, score)| {
                serde_json::json!({ "path": path, "percent": percent, "score": score })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows).map_err(|e| e.to_string())?);
    } else {
        println!("{} file(s) with coverage in [{min_threshold}%, {threshold}%):", ranked.len());
        for (path, percent, score) in &ranked {
            println!("  {score:>8.3}  {percent:>6.2}%  {path}");
        }
    }

    Ok(true)
}

/// List zero-coverage functions. Returns whether anything matched.
fn functions(coverage_path: &Path, json: bool) -> Result<bool, String> {
    let coverage = covgen_report::load_fastcov(coverage_path).map_err(|e| e.to_string())?;
    let uncovered = zero_coverage_functions(&coverage);

    if uncovered.is_empty() {
        eprintln!("No zero-coverage functions found in the coverage report.");
        return Ok(false);
    }

    if json {
        let rows: Vec<serde_json::Value> = uncovered
            .iter()
            .map(|f| {
                serde_json::json!({
                    "path": f.path,
                    "function": f.name,
                    "start_line": f.start_line,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows).map_err(|e| e.to_string())?);
    } else {
        println!("{} zero-coverage function(s):", uncovered.len());
        for function in &uncovered {
            println!("  {}:{}  {}", function.path, function.start_line, function.name);
        }
    }

    Ok(true)
}
