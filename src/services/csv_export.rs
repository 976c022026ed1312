//! CSV projection of the persisted section JSON.

use std::path::{Path, PathBuf};

use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::{debug, info, warn};

use crate::models::{ExtractedTable, SectionData};
use crate::storage::{read_json, sanitize_filename, ExportLayout};

#[derive(Debug, thiserror::Error)]
pub enum CsvExportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Replace any newline sequence with a single space.
fn flatten_newlines(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Header row: the table's headers, or the first row's keys minus `_link`
/// columns.
pub fn table_header(table: &ExtractedTable) -> Vec<String> {
    if !table.headers.is_empty() {
        return table.headers.clone();
    }
    table
        .rows
        .first()
        .map(|row| row.column_keys().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Render one table; every field quoted, `\n` line endings.
pub fn render_table(table: &ExtractedTable) -> Result<Vec<u8>, csv::Error> {
    let header = table_header(table);
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(header.iter().map(|h| flatten_newlines(h)))?;
    for row in &table.rows {
        writer.write_record(
            header
                .iter()
                .map(|h| flatten_newlines(row.get(h).unwrap_or_default())),
        )?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// CSV file names for one section: `<name>.csv`, or `<name>_table<N>.csv`
/// when the section has more than one table.
fn csv_name(section: &str, position: usize, table_count: usize) -> String {
    let base = sanitize_filename(section);
    if table_count > 1 {
        format!("{}_table{}.csv", base, position + 1)
    } else {
        format!("{}.csv", base)
    }
}

/// Write the CSVs for one section into `csv_dir`. Returns the written paths.
pub fn export_section(data: &SectionData, csv_dir: &Path) -> Result<Vec<PathBuf>, CsvExportError> {
    let mut written = Vec::new();
    let table_count = data.tables.len();

    for (position, table) in data.tables.iter().enumerate() {
        if table.rows.is_empty() {
            continue;
        }
        let path = csv_dir.join(csv_name(&data.section, position, table_count));
        let bytes = render_table(table).map_err(|e| CsvExportError::Csv {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, bytes).map_err(|e| CsvExportError::Io {
            path: path.clone(),
            source: e,
        })?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}

/// Project every `data/*.json` into `csv/`. Unreadable files are skipped.
pub fn export_all(layout: &ExportLayout) -> Result<Vec<PathBuf>, CsvExportError> {
    let data_dir = layout.data_dir();
    let csv_dir = layout.csv_dir();
    std::fs::create_dir_all(&csv_dir).map_err(|e| CsvExportError::Io {
        path: csv_dir.clone(),
        source: e,
    })?;

    let entries = match std::fs::read_dir(&data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CsvExportError::Io {
                path: data_dir,
                source: e,
            })
        }
    };

    let mut json_files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    json_files.sort();

    let mut written = Vec::new();
    for path in json_files {
        let data: SectionData = match read_json(&path) {
            Ok(data) => data,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        written.extend(export_section(&data, &csv_dir)?);
    }

    info!("Wrote {} CSV file(s)", written.len());
    Ok(written)
}
