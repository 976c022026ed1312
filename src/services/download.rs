//! File and image downloads through the authenticated browser session.
//!
//! Downloads are best-effort: one failed item is logged and counted, never
//! propagated. Existing destination files are skipped without a fetch, so a
//! re-run only pulls what is missing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use super::retry::RetryPolicy;
use crate::browser::{BrowserError, BrowserSession};
use crate::extract::{is_file_url, is_image_url};
use crate::models::{ExtractedImage, ExtractedLink};
use crate::storage::{sanitize_filename, write_file, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("invalid URL {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("HTTP {0}")]
    Status(u16),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What happened to one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded(PathBuf),
    /// Destination already existed.
    Skipped(PathBuf),
    Failed,
}

/// Tally over a batch of downloads.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadResult {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DownloadResult {
    fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Downloaded(_) => self.downloaded += 1,
            DownloadOutcome::Skipped(_) => self.skipped += 1,
            DownloadOutcome::Failed => self.failed += 1,
        }
    }

    /// Items now present on disk, fetched this run or earlier.
    pub fn present(&self) -> usize {
        self.downloaded + self.skipped
    }

    pub fn merge(&mut self, other: DownloadResult) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Counts for one page's worth of links and images.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageDownloads {
    pub files: DownloadResult,
    pub images: DownloadResult,
}

impl PageDownloads {
    pub fn merge(&mut self, other: PageDownloads) {
        self.files.merge(other.files);
        self.images.merge(other.images);
    }
}

/// Configuration for the downloader.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub files_dir: PathBuf,
    pub images_dir: PathBuf,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

/// Derive the on-disk name for a URL.
///
/// Last non-empty path segment, else `fallback` (an image's alt text), else
/// `download_<8 hex of sha256(url)>`. Always sanitized.
pub fn download_filename(url: &str, fallback: Option<&str>) -> String {
    let from_path = Url::parse(url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back().map(str::to_string))
    });

    let candidates = [from_path.as_deref(), fallback.map(str::trim)];
    for candidate in candidates.into_iter().flatten() {
        let name = sanitize_filename(candidate);
        if !name.is_empty() {
            return name;
        }
    }

    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    format!("download_{}", &digest[..8])
}

/// Links that go to `files/`: file extensions that are not images.
pub fn is_downloadable_link(link: &ExtractedLink) -> bool {
    if !link.is_file {
        return false;
    }
    match Url::parse(&link.href) {
        Ok(url) => is_file_url(&url) && !is_image_url(&url),
        Err(_) => false,
    }
}

pub struct Downloader {
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Self {
        Self { config }
    }

    pub async fn download_link(
        &self,
        session: &mut dyn BrowserSession,
        link: &ExtractedLink,
    ) -> DownloadOutcome {
        let name = download_filename(&link.href, None);
        let dest = self.config.files_dir.join(name);
        self.download_logged(session, &link.href, &dest).await
    }

    pub async fn download_image(
        &self,
        session: &mut dyn BrowserSession,
        image: &ExtractedImage,
    ) -> DownloadOutcome {
        let alt = (!image.alt.is_empty()).then_some(image.alt.as_str());
        let name = download_filename(&image.src, alt);
        let dest = self.config.images_dir.join(name);
        self.download_logged(session, &image.src, &dest).await
    }

    /// Download every eligible link and every image, sequentially.
    pub async fn download_page(
        &self,
        session: &mut dyn BrowserSession,
        links: &[ExtractedLink],
        images: &[ExtractedImage],
    ) -> PageDownloads {
        let mut result = PageDownloads::default();

        for link in links.iter().filter(|l| is_downloadable_link(l)) {
            let outcome = self.download_link(session, link).await;
            result.files.record(&outcome);
        }
        for image in images {
            let outcome = self.download_image(session, image).await;
            result.images.record(&outcome);
        }

        if result.files.downloaded + result.images.downloaded > 0 {
            info!(
                "Downloaded {} file(s), {} image(s)",
                result.files.downloaded, result.images.downloaded
            );
        }
        result
    }

    async fn download_logged(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        dest: &Path,
    ) -> DownloadOutcome {
        match self.download_to(session, url, dest).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Download failed for {}: {}", url, e);
                DownloadOutcome::Failed
            }
        }
    }

    async fn download_to(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        dest: &Path,
    ) -> Result<DownloadOutcome, DownloadError> {
        if dest.exists() {
            debug!("Already downloaded: {}", dest.display());
            return Ok(DownloadOutcome::Skipped(dest.to_path_buf()));
        }
        if Url::parse(url).is_err() {
            return Err(DownloadError::InvalidUrl(url.to_string()));
        }

        let fetched = self
            .config
            .retry
            .fetch_bytes(session, url, self.config.request_timeout)
            .await?;
        if !(200..300).contains(&fetched.status) {
            return Err(DownloadError::Status(fetched.status));
        }

        write_file(dest, &fetched.data)?;
        debug!(
            "Saved {} ({} bytes, {})",
            dest.display(),
            fetched.data.len(),
            fetched.content_type
        );
        Ok(DownloadOutcome::Downloaded(dest.to_path_buf()))
    }
}
