//! In-memory site for driving the exporter without a browser.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use proedge_export::browser::{BrowserError, BrowserSession, FetchedBytes, Navigation};
use proedge_export::config::Settings;
use proedge_export::models::Section;

pub const BASE: &str = "https://app.example.com";

pub enum FakePage {
    /// Fixed pages; clicking anything moves to the next one.
    Paged { status: u16, pages: Vec<String> },
    /// Every page has a next link.
    Endless,
    /// Navigation ends up somewhere else.
    Redirect(String),
    /// Loads, but the browser reports no document status.
    NoStatus(String),
}

pub struct FakeSite {
    routes: HashMap<String, FakePage>,
    resources: HashMap<String, Vec<u8>>,
    current_url: String,
    current_page: usize,
    html: String,
    pub visited: Vec<String>,
    pub clicks: usize,
    pub fetches: Vec<String>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            resources: HashMap::new(),
            current_url: "about:blank".to_string(),
            current_page: 0,
            html: String::new(),
            visited: Vec::new(),
            clicks: 0,
            fetches: Vec::new(),
        }
    }

    pub fn page(mut self, path: &str, html: impl Into<String>) -> Self {
        self.routes.insert(
            url(path),
            FakePage::Paged {
                status: 200,
                pages: vec![html.into()],
            },
        );
        self
    }

    pub fn route(mut self, path: &str, page: FakePage) -> Self {
        self.routes.insert(url(path), page);
        self
    }

    pub fn resource(mut self, path: &str, bytes: &[u8]) -> Self {
        self.resources.insert(url(path), bytes.to_vec());
        self
    }

    pub fn was_visited(&self, path: &str) -> bool {
        self.visited.iter().any(|v| v == &url(path))
    }

    fn render(&self) -> String {
        match self.routes.get(&self.current_url) {
            Some(FakePage::Paged { pages, .. }) => pages[self.current_page].clone(),
            Some(FakePage::Endless) => endless_page(self.current_page + 1),
            Some(FakePage::NoStatus(html)) => html.clone(),
            _ => "<html><body>Not found</body></html>".to_string(),
        }
    }
}

pub fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

fn endless_page(n: usize) -> String {
    format!(
        r#"<html><body><table><tr><th>Item</th></tr><tr><td>row {n}</td></tr></table>
           <a href="/feed.cfm?page={next}">Next</a></body></html>"#,
        n = n,
        next = n + 1
    )
}

#[async_trait]
impl BrowserSession for FakeSite {
    async fn navigate(&mut self, target: &str, _timeout: Duration) -> Result<Navigation, BrowserError> {
        self.visited.push(target.to_string());
        self.current_page = 0;

        let status = match self.routes.get(target) {
            Some(FakePage::Redirect(to)) => {
                let to = to.clone();
                self.current_url = to.clone();
                self.html = self.render();
                return Ok(Navigation {
                    url: to,
                    status: Some(200),
                });
            }
            Some(FakePage::Paged { status, .. }) => Some(*status),
            Some(FakePage::Endless) => Some(200),
            Some(FakePage::NoStatus(_)) => None,
            None => Some(404),
        };

        self.current_url = target.to_string();
        self.html = self.render();
        Ok(Navigation {
            url: target.to_string(),
            status,
        })
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self.current_url.clone())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        Ok(self.html.clone())
    }

    async fn evaluate(&mut self, _script: &str) -> Result<serde_json::Value, BrowserError> {
        Ok(serde_json::Value::Null)
    }

    async fn click(&mut self, selector: &str, index: usize) -> Result<(), BrowserError> {
        let advanced = match self.routes.get(&self.current_url) {
            Some(FakePage::Paged { pages, .. }) => self.current_page + 1 < pages.len(),
            Some(FakePage::Endless) => true,
            _ => false,
        };
        if !advanced {
            return Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
                index,
            });
        }
        self.clicks += 1;
        self.current_page += 1;
        self.html = self.render();
        Ok(())
    }

    async fn fetch_bytes(&mut self, target: &str, _timeout: Duration) -> Result<FetchedBytes, BrowserError> {
        self.fetches.push(target.to_string());
        match self.resources.get(target) {
            Some(data) => Ok(FetchedBytes {
                status: 200,
                content_type: "application/octet-stream".to_string(),
                data: data.clone(),
            }),
            None => Err(BrowserError::Http {
                status: 404,
                url: target.to_string(),
            }),
        }
    }
}

/// Settings with no delays, pointed at `export_dir`.
pub fn settings(export_dir: &Path, sections: &[(&str, &str)]) -> Settings {
    Settings {
        base_url: BASE.to_string(),
        export_dir: export_dir.to_path_buf(),
        request_delay: Duration::ZERO,
        network_idle_timeout: Duration::from_millis(10),
        page_load_timeout: Duration::from_secs(1),
        download_timeout: Duration::from_secs(1),
        max_retries: 0,
        retry_base_delay: Duration::ZERO,
        sections: sections
            .iter()
            .map(|(name, path)| Section::new(*name, *path))
            .collect(),
        ..Default::default()
    }
}

/// A page with one table of `rows` rows (with thead) and extra body markup.
pub fn table_page(title: &str, rows: usize, extra: &str) -> String {
    let body: String = (1..=rows)
        .map(|i| format!("<tr><td>{} {}</td><td>{}</td></tr>", title, i, i * 100))
        .collect();
    format!(
        "<html><head><title>{title}</title></head><body>\
         <table><thead><tr><th>Name</th><th>Amount</th></tr></thead><tbody>{body}</tbody></table>\
         {extra}</body></html>"
    )
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
