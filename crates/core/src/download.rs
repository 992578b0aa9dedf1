//! Download collaborator used to materialize mock outputs
//!
//! Supports `http://`, `https://`, and `file://` URLs.

use crate::errors::{InvocationError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Fetches a URL into a directory under a given file name
pub trait Downloader: Send + Sync {
    /// Fetch `url` to `dest_dir/dest_name` and return the written path
    fn fetch(&self, url: &str, dest_dir: &Path, dest_name: &str) -> Result<PathBuf>;
}

impl<T: Downloader + ?Sized> Downloader for &T {
    fn fetch(&self, url: &str, dest_dir: &Path, dest_name: &str) -> Result<PathBuf> {
        (**self).fetch(url, dest_dir, dest_name)
    }
}

/// Blocking HTTP(S)/file downloader built on reqwest
///
/// The HTTP client is built per fetch so the downloader can be constructed
/// on any thread, including inside an async runtime.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
    timeout: Option<Duration>,
}

impl HttpDownloader {
    /// Create a downloader with no request timeout
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn client(&self, url: &str) -> Result<reqwest::blocking::Client> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(|e| {
            InvocationError::Download {
                url: url.to_string(),
                message: format!("failed to build HTTP client: {}", e),
            }
            .into()
        })
    }

    fn fetch_http(&self, url: &str, dest: &Path) -> Result<()> {
        let download_error = |message: String| InvocationError::Download {
            url: url.to_string(),
            message,
        };

        let response = self
            .client(url)?
            .get(url)
            .send()
            .map_err(|e| download_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("HTTP {}", status)).into());
        }
        let body = response
            .bytes()
            .map_err(|e| download_error(e.to_string()))?;

        // Write to a sibling temp file first so a failed fetch leaves no partial output
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(InvocationError::Io)?;
        staged.write_all(&body).map_err(InvocationError::Io)?;
        staged
            .persist(dest)
            .map_err(|e| InvocationError::Io(e.error))?;
        Ok(())
    }
}

fn file_url_path(url: &str) -> Option<&str> {
    url.strip_prefix("file://")
}

impl Downloader for HttpDownloader {
    #[instrument(skip(self))]
    fn fetch(&self, url: &str, dest_dir: &Path, dest_name: &str) -> Result<PathBuf> {
        let dest = dest_dir.join(dest_name);
        debug!("Fetching {} to {}", url, dest.display());

        if let Some(source) = file_url_path(url) {
            fs::copy(source, &dest).map_err(|e| InvocationError::Download {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        } else if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_http(url, &dest)?;
        } else {
            return Err(InvocationError::Download {
                url: url.to_string(),
                message: "unsupported URL scheme".to_string(),
            }
            .into());
        }

        Ok(dest)
    }
}
