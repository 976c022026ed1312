//! Detail-page discovery and crawling.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use super::{is_login_url, ExportError};
use crate::browser::BrowserSession;
use crate::extract::extract_page;
use crate::models::{DetailRecord, ExtractedLink};
use crate::services::download::{Downloader, PageDownloads};
use crate::services::retry::RetryPolicy;
use crate::storage::{sanitize_filename, write_file, ExportLayout};

/// Path segments that mark a per-record page.
pub const DEFAULT_DETAIL_PATTERNS: &[&str] = &["view", "detail", "details", "edit", "show"];

/// Does a path segment (extension stripped, split on `_`/`-`) name a
/// detail view?
fn segment_matches(segment: &str, patterns: &[String]) -> bool {
    let lower = segment.to_ascii_lowercase();
    let stem = lower.split('.').next().unwrap_or_default();
    stem.split(['_', '-'])
        .any(|word| patterns.iter().any(|p| p.eq_ignore_ascii_case(word)))
}

/// `?id=7`, `?jobId=7`: a query key ending in `id` with a value.
fn has_id_query(url: &Url) -> bool {
    url.query_pairs()
        .any(|(k, v)| k.to_ascii_lowercase().ends_with("id") && !v.is_empty())
}

pub fn is_detail_url(url: &Url, patterns: &[String]) -> bool {
    has_id_query(url)
        || url
            .path_segments()
            .is_some_and(|mut segments| segments.any(|s| segment_matches(s, patterns)))
}

/// Internal, non-file links that look like detail pages, deduplicated by
/// href in first-seen order. A repeated href takes the later link text.
pub fn detail_candidates(links: &[ExtractedLink], patterns: &[String]) -> Vec<ExtractedLink> {
    let mut order: Vec<ExtractedLink> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for link in links.iter().filter(|l| l.is_internal && !l.is_file) {
        let Ok(url) = Url::parse(&link.href) else {
            continue;
        };
        if !is_detail_url(&url, patterns) {
            continue;
        }
        match position.get(&link.href) {
            Some(&i) => {
                if !link.text.is_empty() {
                    order[i].text = link.text.clone();
                }
            }
            None => {
                position.insert(link.href.clone(), order.len());
                order.push(link.clone());
            }
        }
    }

    order
}

/// Unique snapshot names within one section's `details/` directory.
#[derive(Debug, Default)]
pub struct SnapshotNamer {
    used: HashSet<String>,
}

impl SnapshotNamer {
    /// `<sanitized text>.html`, falling back to `detail_<n>`; collisions get
    /// `_2`, `_3`, ...
    pub fn name(&mut self, text: &str, position: usize) -> String {
        let mut stem = sanitize_filename(text);
        if stem.is_empty() {
            stem = format!("detail_{}", position);
        }

        let mut candidate = stem.clone();
        let mut n = 2;
        while self.used.contains(&candidate) {
            candidate = format!("{}_{}", stem, n);
            n += 1;
        }
        self.used.insert(candidate.clone());
        format!("{}.html", candidate)
    }
}

/// Everything `crawl_details` needs besides the session.
pub struct DetailCrawler<'a> {
    pub layout: &'a ExportLayout,
    pub downloader: &'a Downloader,
    pub retry: RetryPolicy,
    pub base_host: &'a str,
    pub page_load_timeout: Duration,
    pub request_delay: Duration,
}

/// Outcome of one section's detail crawl.
#[derive(Debug, Default)]
pub struct DetailCrawl {
    pub records: Vec<DetailRecord>,
    pub downloads: PageDownloads,
    /// `(url, error)` per failed detail page.
    pub errors: Vec<(String, String)>,
    /// Set when a detail page turned out to be the login screen.
    pub session_expired: Option<String>,
}

impl DetailCrawler<'_> {
    /// Visit each candidate in order. One failed page never stops the crawl;
    /// running into the login page does.
    pub async fn crawl(
        &self,
        session: &mut dyn BrowserSession,
        section: &str,
        candidates: &[ExtractedLink],
    ) -> DetailCrawl {
        let mut crawl = DetailCrawl::default();
        let mut namer = SnapshotNamer::default();
        if candidates.is_empty() {
            return crawl;
        }
        info!("{}: crawling {} detail page(s)", section, candidates.len());

        for (i, link) in candidates.iter().enumerate() {
            match self.visit(session, section, link, i + 1, &mut namer).await {
                Ok((record, downloads)) => {
                    crawl.records.push(record);
                    crawl.downloads.merge(downloads);
                }
                Err(ExportError::SessionExpired { url }) => {
                    warn!("{}: session expired on detail page {}", section, url);
                    crawl.session_expired = Some(url);
                    break;
                }
                Err(e) => {
                    warn!("{}: detail page {} failed: {}", section, link.href, e);
                    crawl.errors.push((link.href.clone(), e.to_string()));
                }
            }
        }

        crawl
    }

    async fn visit(
        &self,
        session: &mut dyn BrowserSession,
        section: &str,
        link: &ExtractedLink,
        position: usize,
        namer: &mut SnapshotNamer,
    ) -> Result<(DetailRecord, PageDownloads), ExportError> {
        let nav = self
            .retry
            .navigate(session, &link.href, self.page_load_timeout)
            .await?;
        if nav.is_error_status() {
            return Err(ExportError::HttpStatus {
                status: nav.status.unwrap_or_default(),
                url: link.href.clone(),
            });
        }
        if is_login_url(&nav.url) {
            return Err(ExportError::SessionExpired { url: nav.url });
        }
        tokio::time::sleep(self.request_delay).await;

        let html = session.content().await?;
        let page_url = session.current_url().await.unwrap_or(nav.url);
        let page = extract_page(&html, &page_url, self.base_host);
        if page.looks_like_login() {
            return Err(ExportError::SessionExpired { url: page_url });
        }

        let name = namer.name(&link.text, position);
        write_file(&self.layout.detail_snapshot_dir(section).join(&name), &html)?;
        debug!("{}: saved detail {}", section, name);

        let downloads = self
            .downloader
            .download_page(session, &page.links, &page.images)
            .await;

        let title = page
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| link.text.clone());
        let record = DetailRecord {
            url: page_url,
            title,
            link_count: page.links.len(),
            image_count: page.images.len(),
            tables: page.tables,
            forms: page.forms,
        };
        Ok((record, downloads))
    }
}
