//! Configuration management for proedge-export using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::Section;
use crate::scrapers::detail::DEFAULT_DETAIL_PATTERNS;
use crate::scrapers::pagination::{default_rules, PaginationRule, DEFAULT_MAX_PAGES};
use crate::services::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://app.proedge.com";
pub const DEFAULT_EXPORT_DIR: &str = "exports";
pub const DEFAULT_CDP_URL: &str = "http://127.0.0.1:9222";

/// Built-in section list. Repeated names are aliases.
const DEFAULT_SECTIONS: &[(&str, &str)] = &[
    ("dashboard", "/dashboard.cfm"),
    ("contacts", "/contacts.cfm"),
    ("customers", "/customers.cfm"),
    ("leads", "/leads.cfm"),
    ("jobs", "/jobs.cfm"),
    ("jobs", "/projects.cfm"),
    ("estimates", "/estimates.cfm"),
    ("estimates", "/bids.cfm"),
    ("proposals", "/proposals.cfm"),
    ("change_orders", "/changeorders.cfm"),
    ("work_orders", "/workorders.cfm"),
    ("invoices", "/invoices.cfm"),
    ("payments", "/payments.cfm"),
    ("purchase_orders", "/purchaseorders.cfm"),
    ("vendors", "/vendors.cfm"),
    ("subcontractors", "/subcontractors.cfm"),
    ("employees", "/employees.cfm"),
    ("timesheets", "/timesheets.cfm"),
    ("schedule", "/schedule.cfm"),
    ("schedule", "/calendar.cfm"),
    ("tasks", "/tasks.cfm"),
    ("documents", "/documents.cfm"),
    ("photos", "/photos.cfm"),
    ("products", "/products.cfm"),
    ("reports", "/reports.cfm"),
    ("settings", "/settings.cfm"),
];

pub fn default_sections() -> Vec<Section> {
    DEFAULT_SECTIONS
        .iter()
        .map(|(name, path)| Section::new(*name, *path))
        .collect()
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Site root; section paths are appended to it.
    pub base_url: String,
    pub export_dir: PathBuf,
    /// DevTools HTTP endpoint of the already-running browser.
    pub cdp_url: String,
    /// Politeness delay after each navigation or pagination click.
    pub request_delay: Duration,
    pub page_load_timeout: Duration,
    pub network_idle_timeout: Duration,
    pub download_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub max_pages: usize,
    /// Per-section cap on detail pages (None = all).
    pub max_detail_pages: Option<usize>,
    pub crawl_details: bool,
    pub sections: Vec<Section>,
    pub pagination_rules: Vec<PaginationRule>,
    pub detail_patterns: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            cdp_url: DEFAULT_CDP_URL.to_string(),
            request_delay: Duration::from_millis(1500),
            page_load_timeout: Duration::from_secs(30),
            network_idle_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(60),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(1000),
            max_pages: DEFAULT_MAX_PAGES,
            max_detail_pages: None,
            crawl_details: true,
            sections: default_sections(),
            pagination_rules: default_rules(),
            detail_patterns: DEFAULT_DETAIL_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Lowercased host of `base_url`, used to tell internal links apart.
    pub fn base_host(&self) -> String {
        url::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .unwrap_or_default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_delay)
    }

    /// Absolute URL for a section path.
    pub fn section_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Check the pieces that would only fail later, mid-run.
    pub fn validate(&self) -> Result<(), String> {
        let base = url::Url::parse(&self.base_url)
            .map_err(|e| format!("Invalid base_url {:?}: {}", self.base_url, e))?;
        if base.host_str().is_none() {
            return Err(format!("base_url {:?} has no host", self.base_url));
        }
        if self.sections.is_empty() {
            return Err("No sections configured".to_string());
        }
        if self.max_pages == 0 {
            return Err("max_pages must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Relative paths resolve against the config file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdp_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_load_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_idle_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_base_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_detail_pages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl_details: Option<bool>,
    /// Replaces the built-in section list when non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,
    /// Replaces the built-in pagination rules when non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pagination_rules: Vec<PaginationRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detail_patterns: Vec<String>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    /// No config file found means defaults; a broken one is an error.
    pub async fn load() -> Result<Self, String> {
        match prefer::load("proedge-export").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            Err(_) => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    /// Format follows the extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e)),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// `~` is expanded; absolute paths are returned as-is.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref base_url) = self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(ref export_dir) = self.export_dir {
            settings.export_dir = self.resolve_path(export_dir, base_dir);
        }
        if let Some(ref cdp_url) = self.cdp_url {
            settings.cdp_url = cdp_url.clone();
        }
        if let Some(ms) = self.request_delay_ms {
            settings.request_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = self.page_load_timeout_secs {
            settings.page_load_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.network_idle_timeout_secs {
            settings.network_idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.download_timeout_secs {
            settings.download_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = self.max_retries {
            settings.max_retries = retries;
        }
        if let Some(ms) = self.retry_base_delay_ms {
            settings.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(max) = self.max_pages {
            settings.max_pages = max;
        }
        if self.max_detail_pages.is_some() {
            settings.max_detail_pages = self.max_detail_pages;
        }
        if let Some(crawl) = self.crawl_details {
            settings.crawl_details = crawl;
        }
        if !self.sections.is_empty() {
            settings.sections = self.sections.clone();
        }
        if !self.pagination_rules.is_empty() {
            settings.pagination_rules = self.pagination_rules.clone();
        }
        if !self.detail_patterns.is_empty() {
            settings.detail_patterns = self.detail_patterns.clone();
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Load settings: defaults, then the config file, then environment.
pub async fn load_settings_with_options(options: LoadOptions) -> Result<(Settings, Config), String> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await?,
    };

    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(base_url) = env_override("PROEDGE_BASE_URL") {
        tracing::debug!("Using PROEDGE_BASE_URL from environment: {}", base_url);
        settings.base_url = base_url;
    }
    if let Some(export_dir) = env_override("PROEDGE_EXPORT_DIR") {
        tracing::debug!("Using PROEDGE_EXPORT_DIR from environment: {}", export_dir);
        settings.export_dir = PathBuf::from(shellexpand::tilde(&export_dir).as_ref());
    }
    if let Some(cdp_url) = env_override("PROEDGE_CDP_URL") {
        tracing::debug!("Using PROEDGE_CDP_URL from environment: {}", cdp_url);
        settings.cdp_url = cdp_url;
    }

    Ok((settings, config))
}
