//! Services used by the crawl: downloads, retries and CSV projection.

pub mod csv_export;
pub mod download;
pub mod retry;

pub use download::{DownloadConfig, DownloadOutcome, DownloadResult, Downloader};
pub use retry::RetryPolicy;
