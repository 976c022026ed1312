//! Run manifest.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Per-section counters. Aliases of one name accumulate into one summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    pub paths: Vec<String>,
    pub pages: usize,
    pub tables: usize,
    pub rows: usize,
    pub files: usize,
    pub images: usize,
    pub details: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestError {
    pub section: String,
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStats {
    pub total_sections: usize,
    pub total_pages: usize,
    pub total_tables: usize,
    pub total_rows: usize,
    pub total_files: usize,
    pub total_images: usize,
    pub total_details: usize,
    pub errors: Vec<ManifestError>,
}

/// Summary of one crawl run, written once as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    pub export_date: String,
    pub base_url: String,
    pub export_dir: String,
    pub sections: BTreeMap<String, SectionSummary>,
    pub stats: ManifestStats,
}

impl ExportManifest {
    pub fn new(base_url: &str, export_dir: &str) -> Self {
        Self {
            export_date: Utc::now().to_rfc3339(),
            base_url: base_url.to_string(),
            export_dir: export_dir.to_string(),
            sections: BTreeMap::new(),
            stats: ManifestStats::default(),
        }
    }

    /// Fold one processed path's counters into its section and the totals.
    pub fn record_section(&mut self, name: &str, path: &str, counts: &SectionSummary) {
        let entry = self.sections.entry(name.to_string()).or_default();
        if entry.paths.is_empty() {
            self.stats.total_sections += 1;
        }
        entry.paths.push(path.to_string());
        entry.pages += counts.pages;
        entry.tables += counts.tables;
        entry.rows += counts.rows;
        entry.files += counts.files;
        entry.images += counts.images;
        entry.details += counts.details;

        self.stats.total_pages += counts.pages;
        self.stats.total_tables += counts.tables;
        self.stats.total_rows += counts.rows;
        self.stats.total_files += counts.files;
        self.stats.total_images += counts.images;
        self.stats.total_details += counts.details;
    }

    pub fn record_error(&mut self, section: &str, path: &str, error: impl ToString) {
        self.stats.errors.push(ManifestError {
            section: section.to_string(),
            path: path.to_string(),
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_accumulate() {
        let mut manifest = ExportManifest::new("https://app.example.com", "exports");
        let counts = SectionSummary {
            pages: 2,
            tables: 1,
            rows: 10,
            ..Default::default()
        };
        manifest.record_section("invoices", "/a.cfm", &counts);
        manifest.record_section("invoices", "/b.cfm", &counts);
        manifest.record_section("contacts", "/c.cfm", &counts);

        let invoices = &manifest.sections["invoices"];
        assert_eq!(invoices.paths, vec!["/a.cfm", "/b.cfm"]);
        assert_eq!(invoices.pages, 4);
        assert_eq!(manifest.stats.total_sections, 2);
        assert_eq!(manifest.stats.total_rows, 30);
    }

    #[test]
    fn test_errors_keep_order() {
        let mut manifest = ExportManifest::new("https://x", "exports");
        manifest.record_error("a", "/a", "first");
        manifest.record_error("b", "/b", "second");
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["stats"]["errors"][0]["error"], "first");
        assert_eq!(json["stats"]["errors"][1]["section"], "b");
        assert!(json["stats"].get("totalPages").is_some());
    }
}
