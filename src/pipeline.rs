// src/pipeline.rs
use std::{
    fmt,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, info_span, warn};

use crate::error::Result;
use crate::process::{
    aggregate, export, filter, normalize_table, parse, Dialect, ExportReport, SourceLocator, Table,
};
use crate::statement::StatementType;

/// Non-failure outcomes an operator should still see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    NoFilesForYear { year: i32 },
    EmptyAfterFilter { path: PathBuf },
    NothingToExport,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoFilesForYear { year } => write!(f, "no files found for {}", year),
            Notice::EmptyAfterFilter { path } => {
                write!(f, "no qualifying rows in {}", path.display())
            }
            Notice::NothingToExport => f.write_str("no valid data; nothing exported"),
        }
    }
}

/// A file or year that failed and was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub path: Option<PathBuf>,
    pub error: String,
}

/// Outcome of processing one statement type.
#[derive(Debug, Clone, Serialize)]
pub struct StatementSummary {
    pub statement: StatementType,
    pub files_found: usize,
    pub files_processed: usize,
    pub rows_kept: usize,
    pub notices: Vec<Notice>,
    pub failures: Vec<Failure>,
    pub output: Option<ExportReport>,
}

impl StatementSummary {
    fn new(statement: StatementType) -> Self {
        Self {
            statement,
            files_found: 0,
            files_processed: 0,
            rows_kept: 0,
            notices: Vec::new(),
            failures: Vec::new(),
            output: None,
        }
    }

    pub fn exported(&self) -> bool {
        self.output.is_some()
    }

    /// False when fewer than `minimum` rows were exported.
    pub fn meets_minimum(&self, minimum: usize) -> bool {
        self.output.as_ref().map_or(0, |o| o.rows) >= minimum
    }
}

impl fmt::Display for StatementSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} file(s) found, {} processed, {} failed, {} row(s) kept",
            self.statement,
            self.files_found,
            self.files_processed,
            self.failures.len(),
            self.rows_kept
        )?;
        match &self.output {
            Some(out) => writeln!(f, "  saved to {}", out.path.display())?,
            None => writeln!(f, "  no data exported")?,
        }
        for notice in &self.notices {
            writeln!(f, "  notice: {}", notice)?;
        }
        for failure in &self.failures {
            writeln!(f, "  error: {}", failure.error)?;
        }
        Ok(())
    }
}

/// One statement type to process: where its files are and where to write.
#[derive(Debug, Clone)]
pub struct StatementJob {
    pub statement: StatementType,
    pub locator: SourceLocator,
    pub out_dir: PathBuf,
}

/// parse → filter → normalize for a single file.
pub fn load_file(path: &Path, statement: StatementType, dialect: &Dialect) -> Result<Table> {
    let table = parse(path, dialect)?;
    let mut table = filter(table, statement, path)?;
    normalize_table(&mut table);
    Ok(table)
}

/// Runs the whole pipeline for one statement type. Per-year and per-file
/// failures are recorded in the summary and never abort the run.
pub fn process_statement(
    statement: StatementType,
    locator: &SourceLocator,
    out_dir: &Path,
    dialect: &Dialect,
) -> StatementSummary {
    let span = info_span!("statement", %statement);
    let _guard = span.enter();
    info!("processing started");

    let mut summary = StatementSummary::new(statement);
    let mut tables = Vec::new();

    for year in locator.years() {
        let files = match locator.locate(statement, year) {
            Ok(files) => files,
            Err(e) => {
                error!(year, error = %e, "cannot locate files");
                summary.failures.push(Failure {
                    path: None,
                    error: e.to_string(),
                });
                continue;
            }
        };
        if files.is_empty() {
            warn!(year, "no files found");
            summary.notices.push(Notice::NoFilesForYear { year });
            continue;
        }
        summary.files_found += files.len();

        for path in files {
            match load_file(&path, statement, dialect) {
                Ok(table) if table.is_empty() => {
                    summary.files_processed += 1;
                    warn!(year, path = %path.display(), "no qualifying rows");
                    summary.notices.push(Notice::EmptyAfterFilter { path });
                }
                Ok(table) => {
                    summary.files_processed += 1;
                    info!(year, rows = table.len(), path = %path.display(), "processed");
                    tables.push(table);
                }
                Err(e) => {
                    error!(year, error = %e, "file skipped");
                    summary.failures.push(Failure {
                        path: Some(path),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    let aggregated = aggregate(statement, tables);
    summary.rows_kept = aggregated.len();
    if aggregated.is_empty() {
        warn!("no valid data found; export skipped");
        summary.notices.push(Notice::NothingToExport);
        return summary;
    }

    let dest = out_dir.join(statement.output_file_name());
    match export(&aggregated, &dest, dialect) {
        Ok(report) => {
            info!(path = %report.path.display(), rows = report.rows, "saved");
            summary.output = Some(report);
        }
        Err(e) => {
            error!(error = %e, "export failed");
            summary.failures.push(Failure {
                path: Some(dest),
                error: e.to_string(),
            });
        }
    }
    summary
}

/// Processes every job. Statement types share nothing, so they run in
/// parallel; summaries come back in job order.
pub fn run_all(jobs: &[StatementJob], dialect: &Dialect) -> Vec<StatementSummary> {
    jobs.par_iter()
        .map(|job| process_statement(job.statement, &job.locator, &job.out_dir, dialect))
        .collect()
}
