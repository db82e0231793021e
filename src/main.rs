use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use rayon::prelude::*;
use serde::Serialize;

use matchcode::{MatchEngine, MatchRecord, load_rules_from_directory};

/// Scan files for license texts against a rule corpus.
#[derive(Debug, Parser)]
#[command(name = "matchcode", version, about)]
struct Cli {
    /// Files or directories to scan
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Directory of *.RULE corpus files
    #[arg(long)]
    rules: PathBuf,

    /// Keep only matches scoring at least this much (0-100)
    #[arg(long, default_value_t = 0.0)]
    min_score: f64,

    /// Include match internals (matcher name) in the output
    #[arg(long)]
    diagnostics: bool,

    /// Write the JSON report here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FileResult {
    path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    matches: Vec<MatchRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ScanReport {
    rules: usize,
    files: Vec<FileResult>,
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let records = load_rules_from_directory(&cli.rules)?;
    let rules = records.len();
    let engine = MatchEngine::new(records)?;

    let mut files = Vec::new();
    for path in &cli.paths {
        collect_files(path, &mut files)?;
    }
    files.sort();

    let results: Vec<FileResult> = files
        .par_iter()
        .map(|path| scan_file(&engine, path, cli.min_score, cli.diagnostics))
        .collect();

    let report = ScanReport {
        rules,
        files: results,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match &cli.output {
        Some(output) => {
            fs::write(output, json)
                .with_context(|| format!("cannot write report to {}", output.display()))?;
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// One file is one independent matching task; a file that cannot be read is
/// reported as a file-level error, never aborting the scan.
fn scan_file(engine: &MatchEngine, path: &Path, min_score: f64, diagnostics: bool) -> FileResult {
    match fs::read_to_string(path) {
        Ok(text) => FileResult {
            path: path.display().to_string(),
            matches: engine.match_records(&text, min_score, diagnostics),
            error: None,
        },
        Err(err) => {
            warn!("cannot read {}: {err}", path.display());
            FileResult {
                path: path.display().to_string(),
                matches: Vec::new(),
                error: Some(err.to_string()),
            }
        }
    }
}

fn collect_files(path: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if path.is_file() {
        files.push(path.to_path_buf());
        return Ok(());
    }
    let entries =
        fs::read_dir(path).with_context(|| format!("cannot read directory {}", path.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("cannot list {}", path.display()))?;
        collect_files(&entry.path(), files)?;
    }
    Ok(())
}
