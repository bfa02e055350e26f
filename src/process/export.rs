use std::{
    borrow::Cow,
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use csv::WriterBuilder;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, instrument};

use crate::error::{PipelineError, Result};
use crate::process::{
    aggregate::AggregatedTable, columns::RAW_VALUE, table::Cell, value::parse_decimal, Dialect,
};

/// What was persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

/// Text form of a cell in the given dialect.
pub fn render_cell<'a>(cell: &'a Cell, dialect: &Dialect) -> Cow<'a, str> {
    match cell {
        Cell::Null => Cow::Borrowed(""),
        Cell::Text(s) => Cow::Borrowed(s),
        Cell::Date(d) => Cow::Owned(d.format("%Y-%m-%d").to_string()),
        Cell::Number(n) => {
            let plain = n.normalize().to_string();
            if dialect.decimal_separator == '.' {
                Cow::Owned(plain)
            } else {
                Cow::Owned(plain.replace('.', &dialect.decimal_separator.to_string()))
            }
        }
    }
}

/// Like [`render_cell`], but a numeric `VL_CONTA` text also takes the
/// dialect's decimal separator.
fn render_field<'a>(column: &str, cell: &'a Cell, dialect: &Dialect) -> Cow<'a, str> {
    match cell {
        Cell::Text(s)
            if column == RAW_VALUE
                && dialect.decimal_separator != '.'
                && s.contains('.')
                && parse_decimal(s).is_some() =>
        {
            Cow::Owned(s.replace('.', &dialect.decimal_separator.to_string()))
        }
        _ => render_cell(cell, dialect),
    }
}

fn encode_field<'a>(text: &'a str, dialect: &Dialect, dest: &Path) -> Result<Cow<'a, [u8]>> {
    let (bytes, _, had_errors) = dialect.encoding.encode(text);
    if had_errors {
        return Err(PipelineError::export(
            dest,
            format!("{:?} is not representable in {}", text, dialect.encoding.name()),
        ));
    }
    Ok(bytes)
}

/// Writes `table` to `dest`, replacing any existing file.
///
/// Output goes to a temporary sibling first and is renamed into place, so a
/// failed export leaves no file at `dest`.
#[instrument(level = "info", skip(table, dest, dialect), fields(statement = %table.statement, dest = %dest.display()))]
pub fn export(table: &AggregatedTable, dest: &Path, dialect: &Dialect) -> Result<ExportReport> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| PipelineError::export(dest, e))?;

    let tmp = NamedTempFile::new_in(dir).map_err(|e| PipelineError::export(dest, e))?;
    let mut wtr = WriterBuilder::new()
        .delimiter(dialect.delimiter)
        .from_writer(BufWriter::new(tmp));

    let columns = table.table.columns();
    let header = columns
        .iter()
        .map(|c| encode_field(c, dialect, dest))
        .collect::<Result<Vec<_>>>()?;
    wtr.write_record(&header)
        .map_err(|e| PipelineError::export(dest, e))?;

    for row in table.table.rows() {
        let rendered: Vec<Cow<'_, str>> = columns
            .iter()
            .zip(row)
            .map(|(column, cell)| render_field(column, cell, dialect))
            .collect();
        let fields = rendered
            .iter()
            .map(|text| encode_field(text, dialect, dest))
            .collect::<Result<Vec<_>>>()?;
        wtr.write_record(&fields)
            .map_err(|e| PipelineError::export(dest, e))?;
    }

    let mut buffered = wtr
        .into_inner()
        .map_err(|e| PipelineError::export(dest, e.error().to_string()))?;
    buffered.flush().map_err(|e| PipelineError::export(dest, e))?;
    let tmp = buffered
        .into_inner()
        .map_err(|e| PipelineError::export(dest, e.error().to_string()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PipelineError::export(dest, e))?;
    tmp.persist(dest)
        .map_err(|e| PipelineError::export(dest, e.error))?;

    let bytes = fs::metadata(dest)
        .map_err(|e| PipelineError::export(dest, e))?
        .len();
    info!(rows = table.len(), bytes, "exported");

    Ok(ExportReport {
        path: dest.to_path_buf(),
        rows: table.len(),
        bytes,
    })
}
