//! Text helpers shared by the extractors.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

/// Tags whose text never reaches the rendered page.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All text under an element, whitespace-collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Approximation of `document.body.innerText`: text outside scripts and styles.
pub fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    push_visible(document.root_element(), &mut out);
    collapse_whitespace(&out)
}

fn push_visible(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !INVISIBLE_TAGS.contains(&child_el.value().name()) {
                push_visible(child_el, out);
            }
        }
    }
}

/// `<title>` text, if any.
pub fn page_title(document: &Html) -> Option<String> {
    document
        .select(&TITLE)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Heuristic for "this is a sign-in screen, not the application".
pub fn looks_like_login_page(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("sign in")
        || lower.contains("log in")
        || (lower.contains("username") && lower.contains("password"))
}

/// Resolve an href against the page URL. Without a base only absolute URLs resolve.
pub fn resolve(base: Option<&Url>, href: &str) -> Option<Url> {
    match base {
        Some(base) => base.join(href).ok(),
        None => Url::parse(href).ok(),
    }
}

/// Leading digits of a dimension attribute ("120", "120px"); 0 otherwise.
pub fn parse_dimension(value: Option<&str>) -> u32 {
    value
        .map(|v| {
            v.trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_visible_text_skips_scripts() {
        let doc = Html::parse_document(
            "<html><head><title>T</title></head><body><p>Hello</p><script>var signIn = 'sign in';</script><style>p{}</style><p>World</p></body></html>",
        );
        assert_eq!(visible_text(&doc), "Hello World");
    }

    #[test]
    fn test_login_markers() {
        assert!(looks_like_login_page("Please Sign In to continue"));
        assert!(looks_like_login_page("LOG IN"));
        assert!(looks_like_login_page("Username ... Password"));
        assert!(!looks_like_login_page("Enter your username"));
        assert!(!looks_like_login_page("Invoices Estimates Log out"));
    }

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension(Some("120")), 120);
        assert_eq!(parse_dimension(Some(" 16px")), 16);
        assert_eq!(parse_dimension(Some("auto")), 0);
        assert_eq!(parse_dimension(None), 0);
    }

    #[test]
    fn test_page_title() {
        let doc = Html::parse_document("<title>  Job  #42 </title>");
        assert_eq!(page_title(&doc).as_deref(), Some("Job #42"));
        let doc = Html::parse_document("<p>none</p>");
        assert_eq!(page_title(&doc), None);
    }
}
