//! Export directory layout and file helpers.
//!
//! ```text
//! exports/
//!   manifest.json
//!   data/<section>.json
//!   csv/<section>[_table<N>].csv
//!   html_snapshots/<section>/page_<n>.html
//!   html_snapshots/<section>/details/<title>.html
//!   files/
//!   images/
//! ```

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Longest filename we will produce.
pub const MAX_FILENAME_LEN: usize = 200;

pub const DATA_SUBDIR: &str = "data";
pub const FILES_SUBDIR: &str = "files";
pub const IMAGES_SUBDIR: &str = "images";
pub const SNAPSHOTS_SUBDIR: &str = "html_snapshots";
pub const CSV_SUBDIR: &str = "csv";
pub const MANIFEST_FILENAME: &str = "manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Keep `[A-Za-z0-9_.-]`, replace everything else with `_`, cap the length.
///
/// Leading dots are dropped so nothing lands as a hidden file or `..`.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '_' | '.' | '-' => c,
            _ => '_',
        })
        .collect();

    sanitized
        .trim_start_matches('.')
        .chars()
        .take(MAX_FILENAME_LEN)
        .collect()
}

/// Paths inside one export directory.
#[derive(Debug, Clone)]
pub struct ExportLayout {
    root: PathBuf,
}

impl ExportLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory tree. Existing directories are left alone.
    pub fn create(&self) -> Result<(), StorageError> {
        for dir in [
            self.root.clone(),
            self.data_dir(),
            self.files_dir(),
            self.images_dir(),
            self.snapshots_dir(),
            self.csv_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_SUBDIR)
    }

    pub fn files_dir(&self) -> PathBuf {
        self.root.join(FILES_SUBDIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_SUBDIR)
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_SUBDIR)
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.root.join(CSV_SUBDIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILENAME)
    }

    pub fn section_json_path(&self, section: &str) -> PathBuf {
        self.data_dir()
            .join(format!("{}.json", sanitize_filename(section)))
    }

    pub fn page_snapshot_path(&self, section: &str, page_num: usize) -> PathBuf {
        self.snapshots_dir()
            .join(sanitize_filename(section))
            .join(format!("page_{}.html", page_num))
    }

    pub fn detail_snapshot_dir(&self, section: &str) -> PathBuf {
        self.snapshots_dir()
            .join(sanitize_filename(section))
            .join("details")
    }
}

/// Write a file, creating parent directories as needed.
pub fn write_file(path: &Path, content: impl AsRef<[u8]>) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| StorageError::io(path, e))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StorageError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    write_file(path, json)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let contents = std::fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|e| StorageError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_filename_charset() {
        assert_eq!(sanitize_filename("Job #42: Deck & Roof.pdf"), "Job__42__Deck___Roof.pdf");
        assert_eq!(sanitize_filename("plan-v2_final.dwg"), "plan-v2_final.dwg");
        assert_eq!(sanitize_filename("café"), "caf_");
    }

    #[test]
    fn test_sanitize_filename_truncates() {
        let long = "a".repeat(500);
        assert_eq!(sanitize_filename(&long).len(), MAX_FILENAME_LEN);
    }

    #[test]
    fn test_sanitize_filename_no_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename(".."), "");
    }

    #[test]
    fn test_layout_paths() {
        let layout = ExportLayout::new("/exports");
        assert_eq!(
            layout.section_json_path("change orders"),
            PathBuf::from("/exports/data/change_orders.json")
        );
        assert_eq!(
            layout.page_snapshot_path("contacts", 3),
            PathBuf::from("/exports/html_snapshots/contacts/page_3.html")
        );
        assert_eq!(
            layout.detail_snapshot_dir("contacts"),
            PathBuf::from("/exports/html_snapshots/contacts/details")
        );
        assert_eq!(layout.manifest_path(), PathBuf::from("/exports/manifest.json"));
    }

    #[test]
    fn test_create_and_json_roundtrip() {
        let dir = tempdir().unwrap();
        let layout = ExportLayout::new(dir.path().join("out"));
        layout.create().unwrap();
        assert!(layout.files_dir().is_dir());
        assert!(layout.csv_dir().is_dir());

        let path = layout.section_json_path("x");
        write_json(&path, &serde_json::json!({"a": 1})).unwrap();
        let back: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(back["a"], 1);
    }

    #[test]
    fn test_read_json_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_json::<serde_json::Value>(&path).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }
}
