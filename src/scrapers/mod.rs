//! Crawl drivers: section orchestration, pagination and detail pages.

pub mod detail;
pub mod orchestrator;
pub mod pagination;

pub use orchestrator::Exporter;
pub use pagination::{PaginationRule, PaginationRules};

use std::sync::LazyLock;

use regex::Regex;

use crate::browser::BrowserError;
use crate::storage::StorageError;

static LOGIN_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)login|signin|sign-in|sign_in|logon").unwrap());

/// Does the URL look like the site bounced us to its sign-in screen?
pub fn is_login_url(url: &str) -> bool {
    LOGIN_URL.is_match(url)
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Rules(#[from] pagination::RuleError),

    #[error("No response for {url}")]
    NoResponse { url: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Session expired: landed on login page {url}")]
    SessionExpired { url: String },
}
