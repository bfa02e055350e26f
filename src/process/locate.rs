use std::{
    ops::RangeInclusive,
    path::{Path, PathBuf},
};

use glob::{glob, Pattern};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::statement::StatementType;

/// Finds extracted source files inside one family's working directory.
#[derive(Debug, Clone)]
pub struct SourceLocator {
    work_dir: PathBuf,
    years: RangeInclusive<i32>,
}

impl SourceLocator {
    pub fn new(work_dir: impl Into<PathBuf>, years: RangeInclusive<i32>) -> Self {
        Self {
            work_dir: work_dir.into(),
            years,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.years.clone()
    }

    /// Files holding `statement`'s data for `year`, sorted by path.
    ///
    /// No match is an empty vec, not an error.
    pub fn locate(&self, statement: StatementType, year: i32) -> Result<Vec<PathBuf>> {
        if !self.years.contains(&year) {
            return Err(PipelineError::YearOutOfRange {
                statement,
                year,
                start: *self.years.start(),
                end: *self.years.end(),
            });
        }

        let dir = Pattern::escape(&self.work_dir.to_string_lossy());
        let pattern = format!("{}/{}", dir, statement.file_pattern(year));
        let entries = glob(&pattern).map_err(|e| PipelineError::Pattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => paths.push(path),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "unreadable entry while locating files"),
            }
        }
        paths.sort();
        debug!(%statement, year, found = paths.len(), "located");
        Ok(paths)
    }
}
