//! Input resolution: turn a user-supplied path or URL into a [`FileRecord`].
//!
//! Handlers work on in-memory batches, so both sources are read fully into
//! memory. The record keeps the original file name (or the last URL path
//! segment) because catalog lookups guess the input format from its
//! extension.

use crate::error::ConvertError;
use crate::format::FileRecord;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read `input` (local path or http(s) URL) into a file record.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<FileRecord, ConvertError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

async fn read_local(path: &Path) -> Result<FileRecord, ConvertError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ConvertError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ConvertError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = input_name(&path.to_string_lossy());
    debug!("Read local input: {} ({} bytes)", path.display(), bytes.len());
    Ok(FileRecord::new(name, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<FileRecord, ConvertError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ConvertError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ConvertError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let name = filename_from_url(url);
    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(FileRecord::new(name, bytes.to_vec()))
}

/// Last path segment of `url` when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "download".to_string())
}

/// File name of an input: the path's final component or the URL's last
/// path segment.
pub fn input_name(input: &str) -> String {
    if is_url(input) {
        filename_from_url(input)
    } else {
        Path::new(input)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string())
    }
}

/// Default output path: the input's file name with `extension` swapped in,
/// placed in the current directory.
pub fn default_output_path(input: &str, extension: &str) -> PathBuf {
    let probe = FileRecord::new(input_name(input), Vec::new());
    PathBuf::from(probe.renamed_with_extension(extension))
}
