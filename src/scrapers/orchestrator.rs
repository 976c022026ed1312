//! Section loop: navigate, paginate, download, crawl details, merge.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::Utc;
use scraper::Html;
use tracing::{debug, info, warn};

use super::detail::{detail_candidates, DetailCrawl, DetailCrawler};
use super::pagination::{paginate, PaginationOptions, PaginationRules};
use super::{is_login_url, ExportError};
use crate::browser::BrowserSession;
use crate::config::Settings;
use crate::extract::{looks_like_login_page, visible_text};
use crate::models::{ExportManifest, Section, SectionData, SectionSummary};
use crate::services::csv_export;
use crate::services::download::{DownloadConfig, Downloader};
use crate::services::retry::RetryPolicy;
use crate::storage::{read_json, write_json, ExportLayout, StorageError};

fn html_looks_like_login(html: &str) -> bool {
    looks_like_login_page(&visible_text(&Html::parse_document(html)))
}

/// What one configured path contributed.
#[derive(Debug)]
struct SectionOutcome {
    summary: SectionSummary,
    detail_errors: Vec<(String, String)>,
    session_expired: Option<String>,
}

/// Runs a whole export against one browser session.
pub struct Exporter {
    settings: Settings,
    layout: ExportLayout,
    downloader: Downloader,
    rules: PaginationRules,
    retry: RetryPolicy,
    base_host: String,
}

impl Exporter {
    pub fn new(settings: Settings) -> Result<Self, ExportError> {
        let layout = ExportLayout::new(&settings.export_dir);
        let rules = PaginationRules::compile(&settings.pagination_rules)?;
        let retry = settings.retry_policy();
        let downloader = Downloader::new(DownloadConfig {
            files_dir: layout.files_dir(),
            images_dir: layout.images_dir(),
            request_timeout: settings.download_timeout,
            retry,
        });
        let base_host = settings.base_host();

        Ok(Self {
            settings,
            layout,
            downloader,
            rules,
            retry,
            base_host,
        })
    }

    pub fn layout(&self) -> &ExportLayout {
        &self.layout
    }

    /// Fail if the tab is sitting on a login screen.
    pub async fn check_session(&self, session: &mut dyn BrowserSession) -> Result<(), ExportError> {
        let url = session.current_url().await?;
        if is_login_url(&url) {
            return Err(ExportError::SessionExpired { url });
        }
        let html = session.content().await?;
        if html_looks_like_login(&html) {
            return Err(ExportError::SessionExpired { url });
        }
        Ok(())
    }

    /// Export every configured section, then the CSVs, then the manifest.
    ///
    /// Per-section failures land in the manifest's error list. Only a
    /// failure to create or write the export tree itself is returned.
    pub async fn run(&self, session: &mut dyn BrowserSession) -> Result<ExportManifest, ExportError> {
        self.layout.create()?;
        let mut manifest = ExportManifest::new(
            &self.settings.base_url,
            &self.layout.root().display().to_string(),
        );
        let mut visited: HashSet<&str> = HashSet::new();

        for section in &self.settings.sections {
            if !visited.insert(section.path.as_str()) {
                debug!("Skipping duplicate path {}", section.path);
                continue;
            }
            info!("Section {} ({})", section.name, section.path);

            match self.export_section(session, section).await {
                Ok(outcome) => {
                    manifest.record_section(&section.name, &section.path, &outcome.summary);
                    for (url, error) in outcome.detail_errors {
                        manifest.record_error(&section.name, &url, error);
                    }
                    if let Some(url) = outcome.session_expired {
                        let err = ExportError::SessionExpired { url };
                        warn!("{}; stopping", err);
                        manifest.record_error(&section.name, &section.path, err);
                        break;
                    }
                }
                Err(e @ ExportError::SessionExpired { .. }) => {
                    warn!("{}; stopping", e);
                    manifest.record_error(&section.name, &section.path, e);
                    break;
                }
                Err(e) => {
                    warn!("Section {} ({}) failed: {}", section.name, section.path, e);
                    manifest.record_error(&section.name, &section.path, e);
                }
            }
        }

        if let Err(e) = csv_export::export_all(&self.layout) {
            warn!("CSV export failed: {}", e);
            manifest.record_error("csv", "", e);
        }

        write_json(&self.layout.manifest_path(), &manifest)?;
        Ok(manifest)
    }

    async fn export_section(
        &self,
        session: &mut dyn BrowserSession,
        section: &Section,
    ) -> Result<SectionOutcome, ExportError> {
        let settings = &self.settings;
        let url = settings.section_url(&section.path);

        let nav = self
            .retry
            .navigate(session, &url, settings.page_load_timeout)
            .await?;
        match nav.status {
            None => return Err(ExportError::NoResponse { url }),
            Some(status) if status >= 400 => return Err(ExportError::HttpStatus { status, url }),
            Some(_) => {}
        }
        if is_login_url(&nav.url) {
            return Err(ExportError::SessionExpired { url: nav.url });
        }

        tokio::time::sleep(settings.request_delay).await;
        session.wait_for_idle(settings.network_idle_timeout).await;

        let first_html = session.content().await?;
        if html_looks_like_login(&first_html) {
            return Err(ExportError::SessionExpired { url: nav.url });
        }

        let options = PaginationOptions {
            max_pages: settings.max_pages,
            network_idle_timeout: settings.network_idle_timeout,
            request_delay: settings.request_delay,
        };
        let pages = paginate(
            session,
            &self.layout,
            &section.name,
            first_html,
            &self.base_host,
            &self.rules,
            &options,
        )
        .await?;

        let mut downloads = self
            .downloader
            .download_page(session, &pages.links, &pages.images)
            .await;

        let mut details = DetailCrawl::default();
        if settings.crawl_details {
            let mut candidates = detail_candidates(&pages.links, &settings.detail_patterns);
            if let Some(max) = settings.max_detail_pages {
                candidates.truncate(max);
            }
            let crawler = DetailCrawler {
                layout: &self.layout,
                downloader: &self.downloader,
                retry: self.retry,
                base_host: &self.base_host,
                page_load_timeout: settings.page_load_timeout,
                request_delay: settings.request_delay,
            };
            details = crawler.crawl(session, &section.name, &candidates).await;
            downloads.merge(details.downloads);
        }

        let data = SectionData {
            section: section.name.clone(),
            path: section.path.clone(),
            export_date: Utc::now().to_rfc3339(),
            url: nav.url,
            tables: pages.tables,
            forms: pages.forms,
            links: pages.links,
            images: pages.images,
            details: std::mem::take(&mut details.records),
        };

        let summary = SectionSummary {
            paths: Vec::new(),
            pages: pages.pages,
            tables: data.tables.len(),
            rows: data.row_count(),
            files: downloads.files.present(),
            images: downloads.images.present(),
            details: data.details.len(),
        };

        let path = self.merge_section(data)?;
        info!(
            "{}: {} page(s), {} table(s), {} row(s) -> {}",
            section.name,
            summary.pages,
            summary.tables,
            summary.rows,
            path.display()
        );

        Ok(SectionOutcome {
            summary,
            detail_errors: details.errors,
            session_expired: details.session_expired,
        })
    }

    /// Create `data/<name>.json`, or append to the records already there
    /// (from an earlier alias or an earlier run).
    fn merge_section(&self, data: SectionData) -> Result<PathBuf, StorageError> {
        let path = self.layout.section_json_path(&data.section);

        let merged = if path.exists() {
            match read_json::<SectionData>(&path) {
                Ok(mut existing) => {
                    existing.append(data);
                    existing
                }
                Err(e) => {
                    warn!("Could not merge into {}: {}; rewriting", path.display(), e);
                    data
                }
            }
        } else {
            data
        };

        write_json(&path, &merged)?;
        Ok(path)
    }
}
