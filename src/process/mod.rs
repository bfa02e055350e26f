// src/process/mod.rs
pub mod aggregate;
pub mod export;
pub mod filter;
pub mod locate;
pub mod parse;
pub mod table;
pub mod value;

use encoding_rs::{Encoding, WINDOWS_1252};

pub use aggregate::{aggregate, AggregatedTable};
pub use export::{export, ExportReport};
pub use filter::filter;
pub use locate::SourceLocator;
pub use parse::{harmonize_column, parse};
pub use table::{Cell, Table};
pub use value::{normalize, normalize_table};

/// Harmonized names of the columns the pipeline reads or derives.
pub mod columns {
    pub const TAX_ID: &str = "CNPJ_CIA";
    pub const REFERENCE_DATE: &str = "DT_REFER";
    pub const RECEIPT_DATE: &str = "DT_RECEB";
    pub const EXERCISE_ORDER: &str = "ORDEM_EXERC";
    pub const ACCOUNT_CODE: &str = "CD_CONTA";
    pub const RAW_VALUE: &str = "VL_CONTA";
    pub const SCALE: &str = "ESCALA_MOEDA";
    pub const TREATED_VALUE: &str = "VALOR_TRATADO";
}

/// Exercise-order value marking the most recent period.
pub const LATEST_EXERCISE: &str = "ÚLTIMO";

/// Scale marker for values reported in thousands.
pub const THOUSAND_SCALE: &str = "MIL";

/// How the provider's files are laid out on disk. Used for both reading and
/// writing so exported files re-ingest cleanly.
#[derive(Clone, Copy, Debug)]
pub struct Dialect {
    pub delimiter: u8,
    pub decimal_separator: char,
    pub encoding: &'static Encoding,
}

impl Default for Dialect {
    /// `;`-separated ISO-8859-1 with `,` as the decimal separator. The
    /// WHATWG `iso-8859-1` label resolves to windows-1252 in `encoding_rs`.
    fn default() -> Self {
        Self {
            delimiter: b';',
            decimal_separator: ',',
            encoding: WINDOWS_1252,
        }
    }
}
