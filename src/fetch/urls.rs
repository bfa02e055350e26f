// src/fetch/urls.rs
use anyhow::{Context, Result};
use url::Url;

use crate::statement::StatementFamily;

/// URL of the yearly archive for `family`, e.g.
/// `.../DOC/DFP/DADOS/dfp_cia_aberta_2024.zip`.
pub fn archive_url(family: StatementFamily, year: i32) -> Result<Url> {
    let raw = format!("{}/{}", family.base_url(), family.archive_name(year));
    Url::parse(&raw).with_context(|| format!("building archive URL {}", raw))
}

/// Archive URLs for every year in `years`, in order.
pub fn archive_urls(
    family: StatementFamily,
    years: impl IntoIterator<Item = i32>,
) -> Result<Vec<(i32, Url)>> {
    years
        .into_iter()
        .map(|year| archive_url(family, year).map(|u| (year, u)))
        .collect()
}
