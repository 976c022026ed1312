//! Table extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::text::{element_text, resolve};
use crate::models::{ExtractedTable, Row, LINK_SUFFIX};

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Extract every table on the page, in document order.
pub fn extract_tables(document: &Html, page_url: Option<&Url>) -> Vec<ExtractedTable> {
    document
        .select(&TABLE)
        .enumerate()
        .map(|(index, table)| extract_table(index, table, page_url))
        .collect()
}

fn extract_table(index: usize, table: ElementRef<'_>, page_url: Option<&Url>) -> ExtractedTable {
    let (head_rows, mut body_rows) = table_rows(table);

    // Header row: thead first, else the first row (which is then not data).
    let header_row = match head_rows.into_iter().find(|r| !cells(*r).is_empty()) {
        Some(row) => Some(row),
        None if !body_rows.is_empty() => Some(body_rows.remove(0)),
        None => None,
    };
    let headers = header_row
        .map(|row| column_names(cells(row).into_iter().map(element_text)))
        .unwrap_or_default();

    let rows: Vec<Row> = body_rows
        .into_iter()
        .filter_map(|tr| {
            let cells = cells(tr);
            if cells.is_empty() {
                return None;
            }
            let mut row = Row::new();
            for (i, cell) in cells.into_iter().enumerate() {
                let key = match headers.get(i) {
                    Some(name) => name.clone(),
                    None => unused_name(format!("column_{}", i), |n| headers.iter().any(|h| h == n)),
                };
                row.insert(key.clone(), element_text(cell));
                if let Some(href) = cell
                    .select(&ANCHOR)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| resolve(page_url, href.trim()))
                {
                    row.insert(format!("{}{}", key, LINK_SUFFIX), href.to_string());
                }
            }
            Some(row)
        })
        .collect();

    ExtractedTable {
        table_index: index,
        headers,
        row_count: rows.len(),
        rows,
    }
}

/// Unlabeled or repeated header texts fall back to `column_<index>`, itself
/// suffixed if a header already took it.
fn column_names(texts: impl Iterator<Item = String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    texts
        .enumerate()
        .map(|(i, text)| {
            let name = if text.is_empty() || used.contains(&text) {
                unused_name(format!("column_{}", i), |n| used.contains(n))
            } else {
                text
            };
            used.insert(name.clone());
            name
        })
        .collect()
}

/// `base`, or `base_2`, `base_3`, ... until one is free.
fn unused_name(base: String, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Split a table's own rows into (thead rows, everything else).
/// Rows of nested tables are not included.
fn table_rows(table: ElementRef<'_>) -> (Vec<ElementRef<'_>>, Vec<ElementRef<'_>>) {
    let mut head = Vec::new();
    let mut body = Vec::new();

    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => body.push(child),
            "thead" => head.extend(child_elements(child, "tr")),
            "tbody" | "tfoot" => body.extend(child_elements(child, "tr")),
            _ => {}
        }
    }

    (head, body)
}

fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .collect()
}

fn child_elements<'a>(parent: ElementRef<'a>, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |c| c.value().name() == tag)
}
