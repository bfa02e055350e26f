use std::cmp::Ordering;

use tracing::{debug, instrument};

use crate::process::{
    columns::{EXERCISE_ORDER, RECEIPT_DATE, REFERENCE_DATE, TAX_ID},
    table::{Cell, Table},
};
use crate::statement::{SortTail, StatementType};

/// All surviving rows of one statement type, in canonical order.
#[derive(Debug, Clone)]
pub struct AggregatedTable {
    pub statement: StatementType,
    pub table: Table,
}

impl AggregatedTable {
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when there is nothing to export.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Compares two optional keys; `None` sorts last in either direction.
fn cmp_nulls_last<T: Ord>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn text_at(row: &[Cell], idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row[i].as_text())
}

fn date_at(row: &[Cell], idx: Option<usize>) -> Option<chrono::NaiveDate> {
    idx.and_then(|i| row[i].as_date())
}

/// Concatenates per-file tables in the order given and applies the
/// statement's sort key. The sort is stable.
#[instrument(level = "debug", skip(tables))]
pub fn aggregate(statement: StatementType, tables: Vec<Table>) -> AggregatedTable {
    let mut combined = Table::default();
    for table in tables {
        combined.append(table);
    }

    let tax = combined.column_index(TAX_ID);
    let refer = combined.column_index(REFERENCE_DATE);
    let tail = statement.sort_tail();
    let tail_idx = match tail {
        SortTail::ExerciseOrder => combined.column_index(EXERCISE_ORDER),
        SortTail::ReceiptDate => combined.column_index(RECEIPT_DATE),
    };

    combined.sort_rows_by(|a, b| {
        cmp_nulls_last(text_at(a, tax), text_at(b, tax), false)
            .then_with(|| cmp_nulls_last(date_at(a, refer), date_at(b, refer), true))
            .then_with(|| match tail {
                SortTail::ExerciseOrder => {
                    cmp_nulls_last(text_at(a, tail_idx), text_at(b, tail_idx), true)
                }
                SortTail::ReceiptDate => {
                    cmp_nulls_last(date_at(a, tail_idx), date_at(b, tail_idx), true)
                }
            })
    });

    debug!(rows = combined.len(), "aggregated");
    AggregatedTable {
        statement,
        table: combined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> Cell {
        Cell::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn text(s: &str) -> Cell {
        Cell::Text(s.into())
    }

    fn dfp(rows: Vec<[Cell; 4]>) -> Table {
        let mut t = Table::new(["CNPJ_CIA", "DT_REFER", "ORDEM_EXERC", "TAG"]);
        for r in rows {
            t.push_row(r.to_vec());
        }
        t
    }

    fn tags(agg: &AggregatedTable) -> Vec<String> {
        (0..agg.len())
            .map(|i| agg.table.cell(i, "TAG").and_then(Cell::as_text).unwrap().to_string())
            .collect()
    }

    #[test]
    fn sorts_by_tax_id_then_date_desc() {
        let a = dfp(vec![
            [text("002"), date(2024, 12, 31), text("ÚLTIMO"), text("a")],
            [text("001"), date(2023, 12, 31), text("ÚLTIMO"), text("b")],
        ]);
        let b = dfp(vec![[text("002"), date(2025, 12, 31), text("ÚLTIMO"), text("c")]]);
        let agg = aggregate(StatementType::BalanceSheetConsolidated, vec![a, b]);
        assert_eq!(tags(&agg), ["b", "c", "a"]);
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let rows = dfp(vec![
            [text("002"), date(2024, 12, 31), text("ÚLTIMO"), text("first")],
            [text("001"), date(2024, 12, 31), text("ÚLTIMO"), text("only")],
            [text("002"), date(2024, 12, 31), text("ÚLTIMO"), text("second")],
        ]);
        let agg = aggregate(StatementType::IncomeStatementConsolidated, vec![rows]);
        assert_eq!(tags(&agg), ["only", "first", "second"]);
    }

    #[test]
    fn exercise_order_descending_and_nulls_last() {
        let rows = dfp(vec![
            [text("001"), Cell::Null, text("ÚLTIMO"), text("null-date")],
            [text("001"), date(2024, 12, 31), text("PENÚLTIMO"), text("pen")],
            [text("001"), date(2024, 12, 31), text("ÚLTIMO"), text("ult")],
            [Cell::Null, date(2024, 12, 31), text("ÚLTIMO"), text("no-id")],
        ]);
        let agg = aggregate(StatementType::BalanceSheetIndividual, vec![rows]);
        assert_eq!(tags(&agg), ["ult", "pen", "null-date", "no-id"]);
    }

    #[test]
    fn profile_sorts_by_receipt_date() {
        let mut t = Table::new(["CNPJ_CIA", "DT_REFER", "DT_RECEB", "TAG"]);
        t.push_row(vec![text("001"), date(2024, 1, 1), date(2024, 3, 1), text("early")]);
        t.push_row(vec![text("001"), date(2024, 1, 1), date(2024, 6, 1), text("late")]);
        let agg = aggregate(StatementType::CompanyProfile, vec![t]);
        assert_eq!(tags(&agg), ["late", "early"]);
    }

    #[test]
    fn row_count_is_preserved() {
        let a = dfp(vec![[text("1"), Cell::Null, Cell::Null, text("x")]; 3]);
        let b = dfp(vec![[text("2"), Cell::Null, Cell::Null, text("y")]; 2]);
        let agg = aggregate(StatementType::BalanceSheetConsolidated, vec![a, b]);
        assert_eq!(agg.len(), 5);
    }

    #[test]
    fn empty_input_is_empty() {
        let agg = aggregate(StatementType::CompanyProfile, Vec::new());
        assert!(agg.is_empty());
        assert!(agg.table.columns().is_empty());
    }
}
