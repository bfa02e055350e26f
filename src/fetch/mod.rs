// src/fetch/mod.rs
//! Archive retrieval: download each yearly archive of a family and extract it
//! into the family's working directory. Failures are isolated per year.

pub mod extract;
pub mod urls;
pub mod zips;

use std::{ops::RangeInclusive, path::Path};

use reqwest::Client;
use tracing::{error, info, instrument, warn};

use crate::error::FetchError;
use crate::statement::StatementFamily;

pub use extract::{extract_zip, Extracted};
pub use zips::{download_zip, Download};

/// What happened to one family's archives.
#[derive(Debug, Default)]
pub struct Retrieval {
    pub fetched: usize,
    pub already_present: usize,
    pub extracted_files: usize,
    pub failures: Vec<FetchError>,
}

/// Downloads (if missing) and extracts every archive of `family` for
/// `years` into `work_dir`. One archive at a time.
#[instrument(level = "info", skip(client, work_dir), fields(dir = %work_dir.display()))]
pub async fn retrieve_family(
    client: &Client,
    family: StatementFamily,
    years: RangeInclusive<i32>,
    work_dir: &Path,
) -> anyhow::Result<Retrieval> {
    let mut out = Retrieval::default();

    for (year, url) in urls::archive_urls(family, years)? {
        let download = match download_zip(client, &url, work_dir).await {
            Ok(d) => d,
            Err(e) => {
                error!(year, error = %e, "download failed");
                out.failures.push(e);
                continue;
            }
        };
        match &download {
            Download::Fetched { .. } => out.fetched += 1,
            Download::AlreadyPresent { .. } => out.already_present += 1,
        }

        let zip_path = download.path().to_path_buf();
        let dest = work_dir.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || extract_zip(&zip_path, &dest)).await?;
        match extracted {
            Ok(extracted) => {
                info!(year, files = extracted.files.len(), "extracted");
                out.extracted_files += extracted.files.len();
                for failure in extracted.failures {
                    warn!(year, error = %failure, "member skipped");
                    out.failures.push(failure);
                }
            }
            Err(e) => {
                error!(year, error = %e, "extraction failed");
                out.failures.push(e);
            }
        }
    }

    Ok(out)
}
