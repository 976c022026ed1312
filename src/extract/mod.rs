//! Extractors that turn an HTML snapshot into export records.
//!
//! These never talk to the browser: the session hands over
//! `document.documentElement.outerHTML` and everything here is a pure
//! function of that string plus the page URL. That keeps them testable
//! against plain fixtures.

mod form;
mod link;
mod table;
mod text;

pub use form::extract_forms;
pub use link::{
    extract_images, extract_links, is_file_url, is_image_url, url_extension, FILE_EXTENSIONS,
    IMAGE_EXTENSIONS,
};
pub use table::extract_tables;
pub use text::{collapse_whitespace, element_text, looks_like_login_page, page_title, visible_text};

use scraper::Html;
use url::Url;

use crate::models::{ExtractedForm, ExtractedImage, ExtractedLink, ExtractedTable};

/// The four record types of one page, plus what the crawler needs besides.
#[derive(Debug, Clone, Default)]
pub struct PageExtract {
    pub title: Option<String>,
    pub tables: Vec<ExtractedTable>,
    pub forms: Vec<ExtractedForm>,
    pub links: Vec<ExtractedLink>,
    pub images: Vec<ExtractedImage>,
    /// Rendered text, used for login detection.
    pub text: String,
}

impl PageExtract {
    pub fn looks_like_login(&self) -> bool {
        looks_like_login_page(&self.text)
    }
}

/// Run every extractor over one snapshot.
///
/// Relative URLs resolve against `page_url`; if it does not parse, only
/// absolute URLs survive.
pub fn extract_page(html: &str, page_url: &str, base_host: &str) -> PageExtract {
    let document = Html::parse_document(html);
    let page_url = Url::parse(page_url).ok();
    let base = page_url.as_ref();

    PageExtract {
        title: page_title(&document),
        tables: extract_tables(&document, base),
        forms: extract_forms(&document, base),
        links: extract_links(&document, base, base_host),
        images: extract_images(&document, base),
        text: visible_text(&document),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_page_combines_everything() {
        let html = r#"<html><head><title>Contacts</title></head><body>
            <table><tr><th>Name</th></tr><tr><td>Ann</td></tr></table>
            <form><input name="q" value="x"></form>
            <a href="/files/a.pdf">A</a>
            <img src="/img/logo.png" alt="logo">
        </body></html>"#;
        let page = extract_page(html, "https://app.example.com/contacts.cfm", "app.example.com");

        assert_eq!(page.title.as_deref(), Some("Contacts"));
        assert_eq!(page.tables.len(), 1);
        assert_eq!(page.forms.len(), 1);
        assert_eq!(page.links[0].href, "https://app.example.com/files/a.pdf");
        assert_eq!(page.images[0].src, "https://app.example.com/img/logo.png");
        assert!(!page.looks_like_login());
    }

    #[test]
    fn test_extract_page_without_base_keeps_absolute_only() {
        let html = r#"<a href="/rel">r</a><a href="https://app.example.com/abs">a</a>"#;
        let page = extract_page(html, "not a url", "app.example.com");
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.links[0].href, "https://app.example.com/abs");
    }

    #[test]
    fn test_login_page_detection() {
        let html = "<body><h1>Welcome</h1><label>Username</label><input name=u><label>Password</label><input type=password></body>";
        let page = extract_page(html, "https://app.example.com/", "app.example.com");
        assert!(page.looks_like_login());
    }
}
