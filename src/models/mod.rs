//! Records produced by a crawl run.
//!
//! Everything here serializes with camelCase keys; the JSON shape is the
//! export's public contract (`data/<section>.json`, `manifest.json`).

mod manifest;
mod row;

pub use manifest::{ExportManifest, ManifestError, ManifestStats, SectionSummary};
pub use row::{Row, LINK_SUFFIX};

use serde::{Deserialize, Serialize};

/// One configured area of the target site.
///
/// Several entries may share a `name`; they are aliases of one logical
/// section and their data is merged into a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub path: String,
}

impl Section {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// A table lifted from a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTable {
    pub table_index: usize,
    pub headers: Vec<String>,
    pub row_count: usize,
    pub rows: Vec<Row>,
}

/// A form and the fields worth keeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedForm {
    pub form_index: usize,
    pub action: String,
    pub method: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub value: String,
    /// Full option list for `select` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_text: Option<String>,
    /// Checkbox/radio state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedLink {
    pub text: String,
    pub href: String,
    pub is_internal: bool,
    pub is_file: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub src: String,
    pub alt: String,
    pub width: u32,
    pub height: u32,
}

/// Result of visiting one detail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailRecord {
    pub url: String,
    pub title: String,
    pub tables: Vec<ExtractedTable>,
    pub forms: Vec<ExtractedForm>,
    pub link_count: usize,
    pub image_count: usize,
}

/// Everything exported for one section name, persisted as `data/<name>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionData {
    pub section: String,
    pub path: String,
    pub export_date: String,
    pub url: String,
    #[serde(default)]
    pub tables: Vec<ExtractedTable>,
    #[serde(default)]
    pub forms: Vec<ExtractedForm>,
    #[serde(default)]
    pub links: Vec<ExtractedLink>,
    #[serde(default)]
    pub images: Vec<ExtractedImage>,
    #[serde(default)]
    pub details: Vec<DetailRecord>,
}

impl SectionData {
    /// Append another alias's records after ours. Nothing is deduplicated.
    pub fn append(&mut self, other: SectionData) {
        self.tables.extend(other.tables);
        self.forms.extend(other.forms);
        self.links.extend(other.links);
        self.images.extend(other.images);
        self.details.extend(other.details);
    }

    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.row_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(index: usize, rows: usize) -> ExtractedTable {
        ExtractedTable {
            table_index: index,
            headers: vec!["Name".to_string()],
            row_count: rows,
            rows: (0..rows)
                .map(|i| Row::from_pairs([("Name", format!("r{}", i))]))
                .collect(),
        }
    }

    #[test]
    fn test_append_concatenates_in_order() {
        let mut first = SectionData {
            section: "invoices".into(),
            path: "/invoices.cfm".into(),
            tables: vec![table(0, 2)],
            ..Default::default()
        };
        let second = SectionData {
            section: "invoices".into(),
            path: "/invoices_old.cfm".into(),
            tables: vec![table(0, 3)],
            links: vec![ExtractedLink {
                text: "a".into(),
                href: "https://x/a".into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        first.append(second);

        assert_eq!(first.path, "/invoices.cfm");
        assert_eq!(first.tables.len(), 2);
        assert_eq!(first.tables[1].row_count, 3);
        assert_eq!(first.links.len(), 1);
        assert_eq!(first.row_count(), 5);
    }

    #[test]
    fn test_section_data_uses_camel_case() {
        let data = SectionData {
            section: "contacts".into(),
            export_date: "2026-01-01T00:00:00Z".into(),
            tables: vec![table(0, 1)],
            ..Default::default()
        };
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("exportDate").is_some());
        assert_eq!(json["tables"][0]["rowCount"], 1);
        assert_eq!(json["tables"][0]["tableIndex"], 0);
    }

    #[test]
    fn test_form_field_type_key() {
        let field = FormField {
            name: "status".into(),
            field_type: "select".into(),
            selected_text: Some("Open".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "select");
        assert_eq!(json["selectedText"], "Open");
        assert!(json.get("checked").is_none());
    }
}
