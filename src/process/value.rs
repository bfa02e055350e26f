use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::debug;

use crate::process::{
    columns::{RAW_VALUE, SCALE, TREATED_VALUE},
    table::{Cell, Table},
    THOUSAND_SCALE,
};

/// Padding the provider occasionally appends to values.
const FIXED_POINT_SUFFIX: &str = "0000000000";

/// Removes one literal run of ten trailing zeros, if present.
///
/// Only the exact ten-character suffix is matched. A legitimate value that
/// ends in ten zeros is shortened as well.
pub fn strip_fixed_point_suffix(text: &str) -> &str {
    text.strip_suffix(FIXED_POINT_SUFFIX).unwrap_or(text)
}

/// Parses plain decimal notation (`-12.5`, `1000.`, `1e3`). Never panics.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() || text.contains('_') {
        return None;
    }
    let text = match text.strip_suffix('.') {
        Some(head) if head.ends_with(|c: char| c.is_ascii_digit()) => head,
        _ => text,
    };
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Cleans a raw value and expresses it in base currency units.
///
/// `None` when the value is absent or unparseable; only the `MIL` scale
/// marker rescales.
pub fn normalize(raw: Option<&str>, scale: Option<&str>) -> Option<Decimal> {
    let raw = raw?.trim();
    let value = parse_decimal(strip_fixed_point_suffix(raw))?;

    match scale {
        Some(marker) if marker.trim().to_uppercase() == THOUSAND_SCALE => {
            value.checked_mul(Decimal::ONE_THOUSAND)
        }
        _ => Some(value),
    }
}

/// Uppercases the scale marker and appends `VALOR_TRATADO`.
///
/// Tables without `VL_CONTA` are left untouched.
pub fn normalize_table(table: &mut Table) {
    if !table.has_column(RAW_VALUE) {
        debug!("no {} column; skipping value treatment", RAW_VALUE);
        return;
    }

    table.map_column(SCALE, |cell| match cell {
        Cell::Text(s) => Cell::Text(s.trim().to_uppercase()),
        other => other,
    });

    let raw_idx = table.column_index(RAW_VALUE);
    let scale_idx = table.column_index(SCALE);
    table.derive_column(TREATED_VALUE, |_, row| {
        let raw = raw_idx.and_then(|i| row[i].as_text());
        let scale = scale_idx.and_then(|i| row[i].as_text());
        normalize(raw, scale).map_or(Cell::Null, Cell::Number)
    });
}
