//! Opening dump locations
//!
//! A location is either a local path or an `http(s)://` URL. Remote dumps
//! are streamed to a temporary file in the download directory first and
//! then read from disk, so decoding never holds a network connection open.
//! The temporary file is removed once its reader is dropped, or as soon as
//! the download fails. A `.gz` suffix means the stream is gzip-wrapped;
//! Discogs dumps may be multi-member gzip.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::bufread::MultiGzDecoder;
use futures::StreamExt;
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::SourceConfig;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Where a dump is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(String),
}

impl Location {
    pub fn parse(location: &str) -> Self {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Location::Remote(location.to_string())
        } else {
            Location::Local(PathBuf::from(location))
        }
    }

    /// Whether the location names a gzip file, ignoring any URL query
    pub fn is_gzip(&self) -> bool {
        match self {
            Location::Local(path) => path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("gz")),
            Location::Remote(url) => url_path(url).to_ascii_lowercase().ends_with(".gz"),
        }
    }
}

/// A downloaded dump, deleted from disk when dropped
struct StagedDump {
    file: File,
    _path: TempPath,
}

impl Read for StagedDump {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// Open a dump location as a decompressed byte stream
pub async fn open_source(location: &str, config: &SourceConfig) -> Result<Box<dyn BufRead + Send>> {
    let parsed = Location::parse(location);
    let raw: Box<dyn Read + Send> = match &parsed {
        Location::Local(path) => Box::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        Location::Remote(url) => {
            let (file, path) = download(url, &config.download_dir).await?.into_parts();
            Box::new(StagedDump { file, _path: path })
        },
    };
    let reader = BufReader::with_capacity(READ_BUFFER_SIZE, raw);

    if parsed.is_gzip() {
        debug!(location, "Reading gzip-compressed dump");
        let decoder = MultiGzDecoder::new(reader);
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, decoder)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Stream `url` into a temporary file inside `dir`
///
/// The file is deleted when the returned handle is dropped, including when
/// the download fails part way.
pub async fn download(url: &str, dir: &Path) -> Result<NamedTempFile> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create download directory {}", dir.display()))?;

    let staged = tempfile::Builder::new()
        .prefix(&format!("{}.", file_name(url)))
        .suffix(".part")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create a download file in {}", dir.display()))?;

    info!(url, target = %staged.path().display(), "Downloading dump");

    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to request {}", url))?
        .error_for_status()
        .with_context(|| format!("Download of {} failed", url))?;

    let mut file = tokio::fs::File::from_std(staged.reopen()?);

    let mut bytes = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("Download of {} interrupted", url))?;
        file.write_all(&chunk).await?;
        bytes += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    info!(url, bytes, "Download complete");
    Ok(staged)
}

fn url_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Last path segment of a URL, or a fixed name when there is none
fn file_name(url: &str) -> String {
    let path = url_path(url);
    let after_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    match after_scheme.split_once('/') {
        Some((_, rest)) => match rest.rsplit('/').next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => "dump.xml".to_string(),
        },
        None => "dump.xml".to_string(),
    }
}
