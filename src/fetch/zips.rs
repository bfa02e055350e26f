use std::path::{Path, PathBuf};

use futures_util::{stream::Stream, StreamExt};
use reqwest::Client;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info};
use url::Url;

use crate::error::FetchError;

/// Result of a download attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Download {
    Fetched { path: PathBuf, bytes: u64 },
    /// The archive was already on disk and was not requested again.
    AlreadyPresent { path: PathBuf },
}

impl Download {
    pub fn path(&self) -> &Path {
        match self {
            Download::Fetched { path, .. } | Download::AlreadyPresent { path } => path,
        }
    }
}

/// Local file name for `url`: its last path segment.
pub fn file_name_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("download.zip")
        .to_string()
}

fn retrieval(url: &Url, reason: impl ToString) -> FetchError {
    FetchError::Retrieval {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// Writes every chunk of `stream` to `part_path`. On any failure the
/// partial file is removed before the error is returned.
async fn stream_to_file<S, B, E>(stream: S, part_path: &Path) -> Result<u64, String>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: ToString,
{
    let mut stream = std::pin::pin!(stream);
    let written = async {
        let mut file = fs::File::create(part_path)
            .await
            .map_err(|e| e.to_string())?;
        let mut bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| e.to_string())?;
            let chunk = chunk.as_ref();
            file.write_all(chunk).await.map_err(|e| e.to_string())?;
            bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| e.to_string())?;
        Ok::<u64, String>(bytes)
    }
    .await;

    if written.is_err() {
        let _ = fs::remove_file(part_path).await;
    }
    written
}

/// Download `url` into `dest_dir` under its original file name.
///
/// Existing files are reused. The body is streamed to `<name>.part` and
/// renamed once complete, so an interrupted download never looks finished.
pub async fn download_zip(
    client: &Client,
    url: &Url,
    dest_dir: impl AsRef<Path>,
) -> Result<Download, FetchError> {
    let dest_dir = dest_dir.as_ref();
    let filename = file_name_for(url);
    let dest_path = dest_dir.join(&filename);

    if fs::metadata(&dest_path).await.is_ok_and(|m| m.is_file()) {
        debug!(path = %dest_path.display(), "already present; not fetching");
        return Ok(Download::AlreadyPresent { path: dest_path });
    }

    fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| retrieval(url, e))?;

    let resp = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| retrieval(url, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(retrieval(url, format!("HTTP {}", status)));
    }

    let part_path = dest_dir.join(format!("{}.part", filename));
    let bytes = stream_to_file(resp.bytes_stream(), &part_path)
        .await
        .map_err(|e| retrieval(url, e))?;

    fs::rename(&part_path, &dest_path)
        .await
        .map_err(|e| retrieval(url, e))?;
    info!(name = %filename, bytes, "downloaded");

    Ok(Download::Fetched {
        path: dest_path,
        bytes,
    })
}
