// src/process/parse.rs
use std::{borrow::Cow, fs::File, io::Read, path::Path};

use chrono::NaiveDate;
use csv::{ByteRecord, ReaderBuilder};
use encoding_rs::Encoding;
use tracing::{debug, instrument};

use crate::error::{PipelineError, Result};
use crate::process::{
    columns::{
        ACCOUNT_CODE, EXERCISE_ORDER, RECEIPT_DATE, REFERENCE_DATE, TAX_ID, TREATED_VALUE,
    },
    table::{Cell, Table},
    value::parse_decimal,
    Dialect,
};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Canonical column name: trimmed and uppercased.
pub fn harmonize_column(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Parses the date part of `text`; any trailing time part is ignored.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let head = text.trim().split([' ', 'T']).next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
}

/// How a recognized column is typed after loading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Coercion {
    /// Kept exactly as decoded.
    Raw,
    Trimmed,
    TrimmedUpper,
    Date,
    Decimal,
}

fn coercion_for(column: &str) -> Coercion {
    match column {
        EXERCISE_ORDER => Coercion::TrimmedUpper,
        ACCOUNT_CODE | TAX_ID => Coercion::Trimmed,
        REFERENCE_DATE | RECEIPT_DATE => Coercion::Date,
        TREATED_VALUE => Coercion::Decimal,
        _ => Coercion::Raw,
    }
}

fn coerce(text: Cow<'_, str>, coercion: Coercion, dialect: &Dialect) -> Cell {
    if text.trim().is_empty() {
        return Cell::Null;
    }
    match coercion {
        Coercion::Raw => Cell::Text(text.into_owned()),
        Coercion::Trimmed => Cell::Text(text.trim().to_string()),
        Coercion::TrimmedUpper => Cell::Text(text.trim().to_uppercase()),
        Coercion::Date => parse_date(&text).map_or(Cell::Null, Cell::Date),
        Coercion::Decimal => {
            let text = if dialect.decimal_separator == '.' {
                text
            } else {
                Cow::Owned(text.replace(dialect.decimal_separator, "."))
            };
            parse_decimal(&text).map_or(Cell::Null, Cell::Number)
        }
    }
}

fn decode<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Option<Cow<'a, str>> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    (!had_errors).then_some(text)
}

/// Loads one delimited file into a harmonized, typed table.
#[instrument(level = "debug", skip(path, dialect), fields(path = %path.display()))]
pub fn parse(path: &Path, dialect: &Dialect) -> Result<Table> {
    let file = File::open(path).map_err(|e| PipelineError::parse(path, e))?;
    parse_reader(file, path, dialect)
}

/// Same as [`parse`] over any reader; `origin` only labels errors.
pub fn parse_reader<R: Read>(reader: R, origin: &Path, dialect: &Dialect) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header_record = rdr
        .byte_headers()
        .map_err(|e| PipelineError::parse(origin, e))?
        .clone();
    let headers = header_record
        .iter()
        .map(|h| {
            decode(h, dialect.encoding)
                .map(|name| harmonize_column(&name))
                .ok_or_else(|| PipelineError::parse(origin, "header is not valid in the file encoding"))
        })
        .collect::<Result<Vec<String>>>()?;
    if headers.iter().all(|h| h.is_empty()) {
        return Err(PipelineError::parse(origin, "file has no header row"));
    }
    for (i, name) in headers.iter().enumerate() {
        if !name.is_empty() && headers[..i].contains(name) {
            return Err(PipelineError::parse(
                origin,
                format!("header names column {} more than once", name),
            ));
        }
    }

    let coercions: Vec<Coercion> = headers.iter().map(|h| coercion_for(h)).collect();
    let mut table = Table::new(&headers);

    let mut record = ByteRecord::new();
    let mut line = 1usize;
    loop {
        match rdr.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => return Err(PipelineError::parse(origin, e)),
        }
        line += 1;
        if record.len() > headers.len() {
            return Err(PipelineError::parse(
                origin,
                format!(
                    "record on line {} has {} fields, header has {}",
                    line,
                    record.len(),
                    headers.len()
                ),
            ));
        }

        let row = record
            .iter()
            .zip(&coercions)
            .map(|(field, &coercion)| {
                decode(field, dialect.encoding)
                    .map(|text| coerce(text, coercion, dialect))
                    .ok_or_else(|| {
                        PipelineError::parse(origin, format!("undecodable field on line {}", line))
                    })
            })
            .collect::<Result<Vec<Cell>>>()?;
        table.push_row(row);
    }

    debug!(rows = table.len(), columns = table.columns().len(), "parsed");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn latin1(text: &str) -> Vec<u8> {
        let (bytes, _, had_errors) = Dialect::default().encoding.encode(text);
        assert!(!had_errors);
        bytes.into_owned()
    }

    fn parse_text(text: &str) -> Table {
        parse_reader(latin1(text).as_slice(), Path::new("mem.csv"), &Dialect::default()).unwrap()
    }

    #[test]
    fn harmonizes_headers() {
        let t = parse_text(" dt_refer ;Cnpj_Cia;cd_conta\n2024-12-31;001;1\n");
        assert_eq!(t.columns(), &["DT_REFER", "CNPJ_CIA", "CD_CONTA"]);
        assert_eq!(
            t.cell(0, "DT_REFER"),
            Some(&Cell::Date(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()))
        );
    }

    #[test]
    fn coerces_recognized_columns() {
        let t = parse_text(
            "CNPJ_CIA;ORDEM_EXERC;CD_CONTA;DT_REFER;DENOM_CIA\n 00.000.000/0001-91 ; último ; 3.01 ;não é data;  Banco  \n",
        );
        assert_eq!(t.cell(0, "CNPJ_CIA"), Some(&Cell::Text("00.000.000/0001-91".into())));
        assert_eq!(t.cell(0, "ORDEM_EXERC"), Some(&Cell::Text("ÚLTIMO".into())));
        assert_eq!(t.cell(0, "CD_CONTA"), Some(&Cell::Text("3.01".into())));
        assert_eq!(t.cell(0, "DT_REFER"), Some(&Cell::Null));
        // unrecognized columns are left alone
        assert_eq!(t.cell(0, "DENOM_CIA"), Some(&Cell::Text("  Banco  ".into())));
    }

    #[test]
    fn decodes_latin1_bytes() {
        // 0xDA is 'Ú' in ISO-8859-1
        let bytes = b"ORDEM_EXERC\n\xDALTIMO\n".to_vec();
        let t = parse_reader(bytes.as_slice(), Path::new("mem.csv"), &Dialect::default()).unwrap();
        assert_eq!(t.cell(0, "ORDEM_EXERC"), Some(&Cell::Text("ÚLTIMO".into())));
    }

    #[test]
    fn empty_fields_and_short_rows_are_null() {
        let t = parse_text("A;B;C\nx;;\ny\n");
        assert_eq!(t.rows()[0], vec![Cell::Text("x".into()), Cell::Null, Cell::Null]);
        assert_eq!(t.rows()[1], vec![Cell::Text("y".into()), Cell::Null, Cell::Null]);
    }

    #[test]
    fn wider_record_rejects_the_file() {
        // an unquoted delimiter inside DENOM_CIA shifts every later field
        let text = "CNPJ_CIA;DENOM_CIA;ORDEM_EXERC;CD_CONTA;VL_CONTA\n001;ACME; SA;ÚLTIMO;1;500\n";
        let err = parse_reader(latin1(text).as_slice(), Path::new("wide.csv"), &Dialect::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
        let msg = err.to_string();
        assert!(msg.contains("wide.csv"));
        assert!(msg.contains("line 2 has 6 fields, header has 5"));
    }

    #[test]
    fn duplicate_harmonized_headers_reject_the_file() {
        let text = "CD_CONTA; cd_conta ;VL_CONTA\n1;3.01;10\n";
        let err = parse_reader(latin1(text).as_slice(), Path::new("dup.csv"), &Dialect::default())
            .unwrap_err();
        assert!(err.to_string().contains("CD_CONTA more than once"));
    }

    #[test]
    fn treated_value_uses_dialect_separator() {
        let t = parse_text("VALOR_TRATADO\n1000000,5\n");
        assert_eq!(t.cell(0, "VALOR_TRATADO"), Some(&Cell::Number(dec!(1000000.5))));
    }

    #[test]
    fn date_formats() {
        let d = NaiveDate::from_ymd_opt(2023, 3, 31).unwrap();
        assert_eq!(parse_date("2023-03-31"), Some(d));
        assert_eq!(parse_date("2023/03/31"), Some(d));
        assert_eq!(parse_date("31/03/2023"), Some(d));
        assert_eq!(parse_date("2023-03-31 00:00:00"), Some(d));
        assert_eq!(parse_date("2023-02-30"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let dialect = Dialect {
            encoding: UTF_8,
            ..Dialect::default()
        };
        let bytes = b"A\n\xFF\xFE\n".to_vec();
        let err = parse_reader(bytes.as_slice(), Path::new("bad.csv"), &dialect).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let err = parse(Path::new("/definitely/not/here.csv"), &Dialect::default()).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.csv"));
    }

    #[test]
    fn parses_from_disk() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(&latin1("CNPJ_CIA;VL_CONTA\n001;10\n002;20\n"))?;
        let t = parse(tmp.path(), &Dialect::default())?;
        assert_eq!(t.len(), 2);
        assert_eq!(t.cell(1, "VL_CONTA"), Some(&Cell::Text("20".into())));
        Ok(())
    }
}
