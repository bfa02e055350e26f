// src/statement.rs
use std::{fmt, ops::RangeInclusive, str::FromStr};

use serde::Serialize;

/// Which yearly archive a statement type is published in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StatementFamily {
    /// Standardized financial statements (balance sheet + income statement).
    Dfp,
    /// Registration form (company profile).
    Fca,
}

impl StatementFamily {
    pub const ALL: [StatementFamily; 2] = [StatementFamily::Dfp, StatementFamily::Fca];

    /// Archive / file name prefix, e.g. `dfp_cia_aberta`.
    pub fn prefix(&self) -> &'static str {
        match self {
            StatementFamily::Dfp => "dfp_cia_aberta",
            StatementFamily::Fca => "fca_cia_aberta",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            StatementFamily::Dfp => "https://dados.cvm.gov.br/dados/CIA_ABERTA/DOC/DFP/DADOS",
            StatementFamily::Fca => "https://dados.cvm.gov.br/dados/CIA_ABERTA/DOC/fca/DADOS",
        }
    }

    /// Years the provider publishes for this family and that we accept.
    pub fn supported_years(&self) -> RangeInclusive<i32> {
        match self {
            StatementFamily::Dfp => 2010..=2030,
            StatementFamily::Fca => 2010..=2030,
        }
    }

    /// Window used when the operator does not configure one.
    pub fn default_years(&self) -> RangeInclusive<i32> {
        match self {
            StatementFamily::Dfp => 2024..=2025,
            StatementFamily::Fca => 2020..=2025,
        }
    }

    /// Name of the per-run directory under the base dir.
    pub fn dir_name(&self) -> &'static str {
        match self {
            StatementFamily::Dfp => "DFP",
            StatementFamily::Fca => "FCA",
        }
    }

    pub fn archive_name(&self, year: i32) -> String {
        format!("{}_{}.zip", self.prefix(), year)
    }
}

impl fmt::Display for StatementFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One disclosure dataset we aggregate into a single output file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StatementType {
    BalanceSheetConsolidated,
    BalanceSheetIndividual,
    IncomeStatementConsolidated,
    IncomeStatementIndividual,
    CompanyProfile,
}

/// How rows of a statement type are selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterRule {
    /// Most-recent exercise rows of exactly one account code.
    LatestAccount { account_code: &'static str },
    KeepAll,
}

/// Columns of the composite sort key after `CNPJ_CIA` and `DT_REFER`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortTail {
    ExerciseOrder,
    ReceiptDate,
}

impl StatementType {
    pub const ALL: [StatementType; 5] = [
        StatementType::BalanceSheetConsolidated,
        StatementType::BalanceSheetIndividual,
        StatementType::IncomeStatementConsolidated,
        StatementType::IncomeStatementIndividual,
        StatementType::CompanyProfile,
    ];

    pub fn family(&self) -> StatementFamily {
        match self {
            StatementType::CompanyProfile => StatementFamily::Fca,
            _ => StatementFamily::Dfp,
        }
    }

    /// File token as it appears in the extracted CSV names.
    pub fn token(&self) -> &'static str {
        match self {
            StatementType::BalanceSheetConsolidated => "dfp_cia_aberta_BPA_con",
            StatementType::BalanceSheetIndividual => "dfp_cia_aberta_BPA_ind",
            StatementType::IncomeStatementConsolidated => "dfp_cia_aberta_DRE_con",
            StatementType::IncomeStatementIndividual => "dfp_cia_aberta_DRE_ind",
            StatementType::CompanyProfile => "fca_cia_aberta",
        }
    }

    pub fn filter_rule(&self) -> FilterRule {
        match self {
            StatementType::BalanceSheetConsolidated | StatementType::BalanceSheetIndividual => {
                FilterRule::LatestAccount { account_code: "1" }
            }
            StatementType::IncomeStatementConsolidated
            | StatementType::IncomeStatementIndividual => FilterRule::LatestAccount {
                account_code: "3.01",
            },
            StatementType::CompanyProfile => FilterRule::KeepAll,
        }
    }

    pub fn sort_tail(&self) -> SortTail {
        match self.family() {
            StatementFamily::Dfp => SortTail::ExerciseOrder,
            StatementFamily::Fca => SortTail::ReceiptDate,
        }
    }

    /// Glob (relative to the work dir) matching this type's file for `year`.
    pub fn file_pattern(&self, year: i32) -> String {
        match self.family() {
            StatementFamily::Dfp => format!("*{}_{}.csv", self.token(), year),
            // exact name: the FCA archive ships many sibling sheets
            StatementFamily::Fca => format!("{}_{}.csv", self.token(), year),
        }
    }

    pub fn output_file_name(&self) -> String {
        format!("{}_combinado.csv", self.token())
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for StatementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        StatementType::ALL
            .into_iter()
            .find(|t| {
                t.token().eq_ignore_ascii_case(wanted)
                    || t.token()
                        .strip_prefix("dfp_cia_aberta_")
                        .is_some_and(|short| short.eq_ignore_ascii_case(wanted))
                    || (*t == StatementType::CompanyProfile && wanted.eq_ignore_ascii_case("fca"))
            })
            .ok_or_else(|| {
                format!(
                    "unknown statement type '{}' (expected one of BPA_con, BPA_ind, DRE_con, DRE_ind, fca)",
                    s
                )
            })
    }
}
