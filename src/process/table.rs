use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::process::parse::harmonize_column;

/// One typed field. Missing columns and empty fields are both `Null`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Null,
    Text(String),
    Date(NaiveDate),
    Number(Decimal),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// An in-memory table with harmonized column names.
///
/// Every row has exactly `columns().len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Builds an empty table; names are harmonized on the way in.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|c| harmonize_column(c.as_ref()))
                .collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name`, compared after harmonization.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = harmonize_column(name);
        self.columns.iter().position(|c| *c == wanted)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Appends a row, padding with `Null` or truncating to the table width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Rewrites every cell of `column`. Returns false when the column is absent.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> bool
    where
        F: FnMut(Cell) -> Cell,
    {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        for row in &mut self.rows {
            let cell = std::mem::take(&mut row[idx]);
            row[idx] = f(cell);
        }
        true
    }

    /// Sets (or appends) `column`, computing each value from the full row.
    pub fn derive_column<F>(&mut self, column: &str, mut f: F)
    where
        F: FnMut(&Table, &[Cell]) -> Cell,
    {
        let values: Vec<Cell> = self.rows.iter().map(|r| f(self, r)).collect();
        let idx = match self.column_index(column) {
            Some(idx) => idx,
            None => {
                self.columns.push(harmonize_column(column));
                for row in &mut self.rows {
                    row.push(Cell::Null);
                }
                self.columns.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|r| keep(r));
    }

    /// Reorders rows by `compare`. Stable: equal rows keep their order.
    pub fn sort_rows_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Vec<Cell>, &Vec<Cell>) -> std::cmp::Ordering,
    {
        self.rows.sort_by(compare);
    }

    /// Appends all rows of `other`, adding any columns this table lacks.
    ///
    /// Each column of `other` lands in a distinct column of `self`; a name
    /// repeated in `other` is matched against repeated names here, in order.
    pub fn append(&mut self, other: Table) {
        let mut mapping: Vec<usize> = Vec::with_capacity(other.columns.len());
        for name in &other.columns {
            let free = self
                .columns
                .iter()
                .enumerate()
                .position(|(i, c)| c == name && !mapping.contains(&i));
            let idx = match free {
                Some(idx) => idx,
                None => {
                    self.columns.push(name.clone());
                    for row in &mut self.rows {
                        row.push(Cell::Null);
                    }
                    self.columns.len() - 1
                }
            };
            mapping.push(idx);
        }

        let width = self.columns.len();
        for row in other.rows {
            let mut merged = vec![Cell::Null; width];
            for (cell, &target) in row.into_iter().zip(&mapping) {
                merged[target] = cell;
            }
            self.rows.push(merged);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn lookup_is_case_and_whitespace_insensitive() {
        let t = Table::new([" dt_refer ", "CNPJ_CIA"]);
        assert_eq!(t.columns(), &["DT_REFER".to_string(), "CNPJ_CIA".to_string()]);
        assert_eq!(t.column_index("DT_REFER"), Some(0));
        assert_eq!(t.column_index(" dt_refer "), Some(0));
        assert_eq!(t.column_index("cnpj_cia"), Some(1));
        assert!(!t.has_column("VL_CONTA"));
    }

    #[test]
    fn push_row_pads_and_truncates() {
        let mut t = Table::new(["A", "B"]);
        t.push_row(vec![text("1")]);
        t.push_row(vec![text("1"), text("2"), text("3")]);
        assert_eq!(t.rows()[0], vec![text("1"), Cell::Null]);
        assert_eq!(t.rows()[1], vec![text("1"), text("2")]);
    }

    #[test]
    fn append_unions_columns() {
        let mut a = Table::new(["A", "B"]);
        a.push_row(vec![text("a1"), text("b1")]);
        let mut b = Table::new(["B", "C"]);
        b.push_row(vec![text("b2"), text("c2")]);

        a.append(b);
        assert_eq!(a.columns(), &["A", "B", "C"]);
        assert_eq!(a.rows()[0], vec![text("a1"), text("b1"), Cell::Null]);
        assert_eq!(a.rows()[1], vec![Cell::Null, text("b2"), text("c2")]);
    }

    #[test]
    fn append_keeps_repeated_columns_apart() {
        let mut a = Table::new(["A"]);
        a.push_row(vec![text("a1")]);
        let mut b = Table::new(["A", "a"]);
        b.push_row(vec![text("first"), text("second")]);

        a.append(b);
        assert_eq!(a.columns(), &["A", "A"]);
        assert_eq!(a.rows()[0], vec![text("a1"), Cell::Null]);
        assert_eq!(a.rows()[1], vec![text("first"), text("second")]);
    }

    #[test]
    fn derive_column_appends_when_missing() {
        let mut t = Table::new(["V"]);
        t.push_row(vec![Cell::Number(dec!(2))]);
        t.derive_column("DOUBLE", |tbl, row| {
            let idx = tbl.column_index("V").unwrap();
            match row[idx].as_number() {
                Some(n) => Cell::Number(n * dec!(2)),
                None => Cell::Null,
            }
        });
        assert_eq!(t.cell(0, "double"), Some(&Cell::Number(dec!(4))));
    }
}
