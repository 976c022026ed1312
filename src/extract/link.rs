//! Link and image extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use super::text::{element_text, parse_dimension, resolve};
use crate::models::{ExtractedImage, ExtractedLink};

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").unwrap());

/// Extensions that mark a link as a downloadable file.
pub const FILE_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "csv", "zip", "rar", "jpg", "jpeg", "png", "gif", "bmp",
    "webp", "tif", "tiff", "dwg", "dxf",
];

/// The image subset of [`FILE_EXTENSIONS`].
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

/// Images at or below this size in both dimensions are treated as UI chrome.
const MIN_IMAGE_DIMENSION: u32 = 20;

/// Lowercased extension of the URL's last path segment.
pub fn url_extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

pub fn is_file_url(url: &Url) -> bool {
    url_extension(url).is_some_and(|ext| FILE_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_image_url(url: &Url) -> bool {
    url_extension(url).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn is_excluded_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    href.is_empty() || href == "#" || lower.starts_with("javascript:") || lower.starts_with("mailto:")
}

/// Extract anchors, deduplicated by resolved href.
pub fn extract_links(document: &Html, page_url: Option<&Url>, base_host: &str) -> Vec<ExtractedLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&ANCHOR) {
        let raw = anchor.value().attr("href").unwrap_or_default().trim();
        if is_excluded_href(raw) {
            continue;
        }
        let Some(url) = resolve(page_url, raw) else {
            continue;
        };
        let href = url.to_string();
        if !seen.insert(href.clone()) {
            continue;
        }

        links.push(ExtractedLink {
            text: element_text(anchor),
            is_internal: url.host_str().is_some_and(|h| h.eq_ignore_ascii_case(base_host)),
            is_file: is_file_url(&url),
            href,
        });
    }

    links
}

/// Extract images, skipping data URIs and tiny icons, deduplicated by src.
pub fn extract_images(document: &Html, page_url: Option<&Url>) -> Vec<ExtractedImage> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for img in document.select(&IMG) {
        let raw = img.value().attr("src").unwrap_or_default().trim();
        if raw.is_empty() || raw.to_ascii_lowercase().starts_with("data:") {
            continue;
        }

        let width = parse_dimension(img.value().attr("width"));
        let height = parse_dimension(img.value().attr("height"));
        if width > 0 && height > 0 && width < MIN_IMAGE_DIMENSION && height < MIN_IMAGE_DIMENSION {
            continue;
        }

        let Some(url) = resolve(page_url, raw) else {
            continue;
        };
        let src = url.to_string();
        if !seen.insert(src.clone()) {
            continue;
        }

        images.push(ExtractedImage {
            src,
            alt: img.value().attr("alt").unwrap_or_default().trim().to_string(),
            width,
            height,
        });
    }

    images
}
