use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use tracing::{debug, instrument, warn};
use zip::ZipArchive;

use crate::error::FetchError;

/// Files written by [`extract_zip`] and members that could not be.
#[derive(Debug, Default)]
pub struct Extracted {
    pub files: Vec<PathBuf>,
    pub failures: Vec<FetchError>,
}

fn extraction(archive: &Path, reason: impl ToString) -> FetchError {
    FetchError::Extraction {
        archive: archive.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Extracts every member of `zip_path` into `dest_dir`, overwriting files.
///
/// An unreadable archive is an error; a bad member is recorded and the
/// remaining members are still extracted.
#[instrument(level = "info", skip(zip_path, dest_dir), fields(zip = %zip_path.display()))]
pub fn extract_zip(zip_path: &Path, dest_dir: &Path) -> Result<Extracted, FetchError> {
    let file = File::open(zip_path).map_err(|e| extraction(zip_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| extraction(zip_path, e))?;
    fs::create_dir_all(dest_dir).map_err(|e| extraction(zip_path, e))?;

    let mut out = Extracted::default();
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(index = i, error = %e, "unreadable archive member");
                out.failures
                    .push(extraction(zip_path, format!("member #{}: {}", i, e)));
                continue;
            }
        };
        let name = entry.name().to_string();
        let Some(relative) = entry.enclosed_name() else {
            warn!(member = %name, "unsafe member path; skipped");
            out.failures
                .push(extraction(zip_path, format!("unsafe member path {}", name)));
            continue;
        };
        let target = dest_dir.join(relative);

        if entry.is_dir() {
            if let Err(e) = fs::create_dir_all(&target) {
                out.failures
                    .push(extraction(zip_path, format!("{}: {}", name, e)));
            }
            continue;
        }

        let written = (|| -> io::Result<()> {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut dest = File::create(&target)?;
            io::copy(&mut entry, &mut dest)?;
            Ok(())
        })();
        match written {
            Ok(()) => {
                debug!(member = %name, "extracted");
                out.files.push(target);
            }
            Err(e) => {
                warn!(member = %name, error = %e, "member extraction failed");
                let _ = fs::remove_file(&target);
                out.failures
                    .push(extraction(zip_path, format!("{}: {}", name, e)));
            }
        }
    }

    Ok(out)
}
