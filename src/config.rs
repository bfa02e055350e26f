// src/config.rs
use std::{
    fmt, fs, io,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Result};
use clap::Parser;

use crate::statement::{StatementFamily, StatementType};

/// Inclusive year window, written `2020..=2025`, `2020-2025` or `2024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn range(&self) -> RangeInclusive<i32> {
        self.start..=self.end
    }
}

impl FromStr for YearRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (start, end) = match s.split_once("..=").or_else(|| s.split_once('-')) {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (s, s),
        };
        let parse = |v: &str| {
            v.parse::<i32>()
                .map_err(|_| format!("invalid year '{}' in '{}'", v, s))
        };
        let (start, end) = (parse(start)?, parse(end)?);
        if start > end {
            return Err(format!("year range '{}' is reversed", s));
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Download, normalize and combine CVM open-company disclosure datasets
#[derive(Parser, Debug, Clone)]
#[command(name = "cvmscraper", version)]
pub struct Settings {
    /// Directory under which the per-family run directories (DFP, FCA) are created
    #[arg(long, env = "CVM_BASE_DIR", default_value = "cvm")]
    pub base_dir: PathBuf,

    /// Statement types to build (BPA_con, BPA_ind, DRE_con, DRE_ind, fca)
    #[arg(
        long,
        env = "CVM_STATEMENTS",
        value_delimiter = ',',
        default_values_t = StatementType::ALL.to_vec()
    )]
    pub statements: Vec<StatementType>,

    /// Years of DFP archives (balance sheet and income statement)
    #[arg(long, env = "CVM_DFP_YEARS")]
    pub dfp_years: Option<YearRange>,

    /// Years of FCA archives (company profile)
    #[arg(long, env = "CVM_FCA_YEARS")]
    pub fca_years: Option<YearRange>,

    /// Do not contact the network; process files already in the run
    /// directory (implies --reuse-dir)
    #[arg(long)]
    pub skip_download: bool,

    /// Reuse an existing run directory instead of creating a fresh one
    #[arg(long)]
    pub reuse_dir: bool,

    /// Fail the run when a statement type exports fewer rows than this
    #[arg(long, env = "CVM_MIN_ROWS")]
    pub min_rows: Option<usize>,

    /// Also write the run summary as JSON to this path
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "CVM_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Settings {
    /// Configured (or default) years for `family`, checked against the
    /// window the provider publishes.
    pub fn years_for(&self, family: StatementFamily) -> Result<RangeInclusive<i32>> {
        let configured = match family {
            StatementFamily::Dfp => self.dfp_years,
            StatementFamily::Fca => self.fca_years,
        };
        let years = configured
            .map(|y| y.range())
            .unwrap_or_else(|| family.default_years());
        let supported = family.supported_years();
        if !supported.contains(years.start()) || !supported.contains(years.end()) {
            bail!(
                "{} years {}..={} fall outside the supported window {}..={}",
                family,
                years.start(),
                years.end(),
                supported.start(),
                supported.end()
            );
        }
        Ok(years)
    }

    /// Families needed by the selected statements, without duplicates.
    pub fn families(&self) -> Vec<StatementFamily> {
        StatementFamily::ALL
            .into_iter()
            .filter(|f| self.statements.iter().any(|s| s.family() == *f))
            .collect()
    }

    /// Selected statement types in order, each once.
    pub fn selected_statements(&self) -> Vec<StatementType> {
        let mut out: Vec<StatementType> = Vec::with_capacity(self.statements.len());
        for s in &self.statements {
            if !out.contains(s) {
                out.push(*s);
            }
        }
        out
    }

    /// Checks everything that can be checked before touching the disk.
    pub fn validate(&self) -> Result<()> {
        if self.statements.is_empty() {
            bail!("no statement types selected");
        }
        for family in self.families() {
            self.years_for(family)?;
        }
        Ok(())
    }

    /// Run directory for `family`; see [`resolve_run_dir`]. A run that does
    /// not download always works in the existing directory.
    pub fn run_dir(&self, family: StatementFamily) -> io::Result<PathBuf> {
        let reuse = self.reuse_dir || self.skip_download;
        resolve_run_dir(&self.base_dir, family.dir_name(), reuse)
    }
}

/// Creates and returns `base/name`. When it already exists and `reuse` is
/// false, the first free `base/name-<n>` is used instead.
pub fn resolve_run_dir(base: &Path, name: &str, reuse: bool) -> io::Result<PathBuf> {
    fs::create_dir_all(base)?;
    let first = base.join(name);
    if reuse {
        fs::create_dir_all(&first)?;
        return Ok(first);
    }

    let mut candidate = first;
    let mut n = 1;
    loop {
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                candidate = base.join(format!("{}-{}", name, n));
                n += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn year_range_forms() {
        assert_eq!("2020..=2025".parse::<YearRange>(), Ok(YearRange { start: 2020, end: 2025 }));
        assert_eq!("2020-2025".parse::<YearRange>(), Ok(YearRange { start: 2020, end: 2025 }));
        assert_eq!("2024".parse::<YearRange>(), Ok(YearRange { start: 2024, end: 2024 }));
        assert!("2025..=2020".parse::<YearRange>().is_err());
        assert!("twenty".parse::<YearRange>().is_err());
    }

    #[test]
    fn defaults_cover_every_statement() {
        let s = Settings::try_parse_from(["cvmscraper"]).unwrap();
        assert_eq!(s.statements, StatementType::ALL.to_vec());
        assert_eq!(s.families(), vec![StatementFamily::Dfp, StatementFamily::Fca]);
        assert_eq!(s.years_for(StatementFamily::Dfp).unwrap(), 2024..=2025);
        assert_eq!(s.years_for(StatementFamily::Fca).unwrap(), 2020..=2025);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn explicit_statements_and_years() {
        let s = Settings::try_parse_from([
            "cvmscraper",
            "--statements",
            "BPA_con,fca",
            "--fca-years",
            "2021-2022",
        ])
        .unwrap();
        assert_eq!(
            s.statements,
            vec![
                StatementType::BalanceSheetConsolidated,
                StatementType::CompanyProfile
            ]
        );
        assert_eq!(s.years_for(StatementFamily::Fca).unwrap(), 2021..=2022);
    }

    #[test]
    fn repeated_statements_run_once() {
        let s = Settings::try_parse_from(["cvmscraper", "--statements", "fca,BPA_con,FCA"]).unwrap();
        assert_eq!(
            s.selected_statements(),
            vec![
                StatementType::CompanyProfile,
                StatementType::BalanceSheetConsolidated
            ]
        );
    }

    #[test]
    fn only_needed_families() {
        let s = Settings::try_parse_from(["cvmscraper", "--statements", "DRE_ind"]).unwrap();
        assert_eq!(s.families(), vec![StatementFamily::Dfp]);
    }

    #[test]
    fn years_outside_supported_window_fail_validation() {
        let s = Settings::try_parse_from(["cvmscraper", "--dfp-years", "1990..=2024"]).unwrap();
        assert!(s.validate().is_err());
    }

    #[test]
    fn run_dir_gets_unique_name() {
        let tmp = TempDir::new().unwrap();
        let a = resolve_run_dir(tmp.path(), "DFP", false).unwrap();
        let b = resolve_run_dir(tmp.path(), "DFP", false).unwrap();
        let c = resolve_run_dir(tmp.path(), "DFP", false).unwrap();
        assert_eq!(a, tmp.path().join("DFP"));
        assert_eq!(b, tmp.path().join("DFP-1"));
        assert_eq!(c, tmp.path().join("DFP-2"));

        let reused = resolve_run_dir(tmp.path(), "DFP", true).unwrap();
        assert_eq!(reused, a);
    }

    #[test]
    fn skip_download_processes_the_existing_directory() {
        let tmp = TempDir::new().unwrap();
        let existing = tmp.path().join("DFP");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join("dfp_cia_aberta_BPA_con_2024.csv"), b"CNPJ_CIA\n").unwrap();

        let base = tmp.path().to_str().unwrap();
        let s = Settings::try_parse_from(["cvmscraper", "--skip-download", "--base-dir", base])
            .unwrap();
        assert_eq!(s.run_dir(StatementFamily::Dfp).unwrap(), existing);
        assert!(!tmp.path().join("DFP-1").exists());

        let fresh = Settings::try_parse_from(["cvmscraper", "--base-dir", base]).unwrap();
        assert_eq!(fresh.run_dir(StatementFamily::Dfp).unwrap(), tmp.path().join("DFP-1"));
    }
}
