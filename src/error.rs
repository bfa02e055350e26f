use std::path::PathBuf;

use thiserror::Error;

use crate::statement::StatementType;

/// Failures of the archive retrieval collaborator. Each is isolated to a
/// single year or archive member.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The archive could not be downloaded.
    #[error("retrieval of {url} failed: {reason}")]
    Retrieval { url: String, reason: String },

    /// The archive (or one of its members) could not be extracted.
    #[error("extraction of {archive} failed: {reason}")]
    Extraction { archive: PathBuf, reason: String },
}

/// Failures of the ingestion pipeline. Each is isolated to one file, one
/// year or one export and never aborts the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A source file could not be opened, read or decoded.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A column the statement's filter needs is absent from the file.
    #[error("{path} has no {column} column")]
    MissingColumn { path: PathBuf, column: &'static str },

    /// The requested year is outside the configured window.
    #[error("year {year} is outside the configured window {start}..={end} for {statement}")]
    YearOutOfRange {
        statement: StatementType,
        year: i32,
        start: i32,
        end: i32,
    },

    /// The aggregated table could not be persisted.
    #[error("failed to export {path}: {reason}")]
    Export { path: PathBuf, reason: String },

    /// A glob pattern built from the configuration was rejected.
    #[error("invalid file pattern {pattern}: {reason}")]
    Pattern { pattern: String, reason: String },
}

impl PipelineError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn export(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::Export {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
