use std::path::Path;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::process::{
    columns::{ACCOUNT_CODE, EXERCISE_ORDER},
    table::Table,
    LATEST_EXERCISE,
};
use crate::statement::{FilterRule, StatementType};

/// Keeps only the rows carrying the statement's canonical line item.
///
/// `origin` labels the error when a required column is missing.
pub fn filter(mut table: Table, statement: StatementType, origin: &Path) -> Result<Table> {
    let account_code = match statement.filter_rule() {
        FilterRule::KeepAll => return Ok(table),
        FilterRule::LatestAccount { account_code } => account_code,
    };

    let order_idx = table
        .column_index(EXERCISE_ORDER)
        .ok_or_else(|| PipelineError::MissingColumn {
            path: origin.to_path_buf(),
            column: EXERCISE_ORDER,
        })?;
    let code_idx = table
        .column_index(ACCOUNT_CODE)
        .ok_or_else(|| PipelineError::MissingColumn {
            path: origin.to_path_buf(),
            column: ACCOUNT_CODE,
        })?;

    let before = table.len();
    table.retain_rows(|row| {
        row[order_idx].as_text() == Some(LATEST_EXERCISE)
            && row[code_idx].as_text() == Some(account_code)
    });
    debug!(%statement, before, after = table.len(), "filtered");
    Ok(table)
}
