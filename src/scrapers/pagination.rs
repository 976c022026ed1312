//! Next-page detection and the per-section pagination loop.
//!
//! Detection is a priority list of rules evaluated against the HTML
//! snapshot; the first enabled element any rule accepts is the control.
//! Rules come from config, so new pager markup needs no code change.

use std::time::Duration;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ExportError;
use crate::browser::BrowserSession;
use crate::extract::{element_text, extract_page};
use crate::models::{ExtractedForm, ExtractedImage, ExtractedLink, ExtractedTable};
use crate::storage::{write_file, ExportLayout};

/// Hard cap on pages visited per section.
pub const DEFAULT_MAX_PAGES: usize = 100;

/// How a rule decides whether a selected element is the next-page control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Matcher {
    /// Any element the selector matches.
    Any,
    /// Element text (or `value` for inputs) matches a regex.
    Text { pattern: String },
    /// An attribute matches a regex.
    Attr { name: String, pattern: String },
    /// Element text is exactly the current page number plus one.
    NextNumber,
}

/// One entry of the detection priority list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationRule {
    pub name: String,
    pub selector: String,
    pub matcher: Matcher,
}

impl PaginationRule {
    fn new(name: &str, selector: &str, matcher: Matcher) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            matcher,
        }
    }
}

const NEXT_TEXT: &str = r"(?i)^(next(\s+page)?\s*[›»>]*|[›»]|>>?)$";

/// Built-in detection order.
pub fn default_rules() -> Vec<PaginationRule> {
    let next_text = || Matcher::Text {
        pattern: NEXT_TEXT.to_string(),
    };
    vec![
        PaginationRule::new("next_link", "a", next_text()),
        PaginationRule::new("next_button", "button, input[type=button], input[type=submit]", next_text()),
        PaginationRule::new("rel_next", "a[rel~=next]", Matcher::Any),
        PaginationRule::new(
            "aria_next",
            "a[aria-label], button[aria-label]",
            Matcher::Attr {
                name: "aria-label".to_string(),
                pattern: r"(?i)^next".to_string(),
            },
        ),
        PaginationRule::new(
            "class_next",
            ".pagination .next a, .pagination a.next, .pager .next a, .pager a.next, \
             .paginate_button.next, a.next-page, button.next-page",
            Matcher::Any,
        ),
        PaginationRule::new(
            "numbered",
            ".pagination a, .pager a, .paging a, .dataTables_paginate a",
            Matcher::NextNumber,
        ),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("pagination rule {rule}: bad selector {selector:?}")]
    Selector { rule: String, selector: String },

    #[error("pagination rule {rule}: {source}")]
    Regex {
        rule: String,
        #[source]
        source: regex::Error,
    },
}

enum CompiledMatcher {
    Any,
    Text(Regex),
    Attr(String, Regex),
    NextNumber,
}

struct CompiledRule {
    name: String,
    selector_text: String,
    selector: Selector,
    matcher: CompiledMatcher,
}

/// Rules with selectors and regexes parsed once.
pub struct PaginationRules {
    rules: Vec<CompiledRule>,
}

impl PaginationRules {
    pub fn compile(rules: &[PaginationRule]) -> Result<Self, RuleError> {
        let regex = |rule: &PaginationRule, pattern: &str| {
            Regex::new(pattern).map_err(|e| RuleError::Regex {
                rule: rule.name.clone(),
                source: e,
            })
        };

        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let selector = Selector::parse(&rule.selector).map_err(|_| RuleError::Selector {
                rule: rule.name.clone(),
                selector: rule.selector.clone(),
            })?;
            let matcher = match &rule.matcher {
                Matcher::Any => CompiledMatcher::Any,
                Matcher::Text { pattern } => CompiledMatcher::Text(regex(rule, pattern)?),
                Matcher::Attr { name, pattern } => {
                    CompiledMatcher::Attr(name.clone(), regex(rule, pattern)?)
                }
                Matcher::NextNumber => CompiledMatcher::NextNumber,
            };
            compiled.push(CompiledRule {
                name: rule.name.clone(),
                selector_text: rule.selector.clone(),
                selector,
                matcher,
            });
        }
        Ok(Self { rules: compiled })
    }

    pub fn defaults() -> Self {
        // Built-in rules are known to compile.
        Self::compile(&default_rules()).unwrap_or(Self { rules: Vec::new() })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// A detected control: click the `index`-th element matching `selector`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextControl {
    pub rule: String,
    pub selector: String,
    pub index: usize,
}

fn has_disabled_class(element: ElementRef<'_>) -> bool {
    element.value().classes().any(|c| c.eq_ignore_ascii_case("disabled"))
}

fn is_disabled(element: ElementRef<'_>) -> bool {
    let el = element.value();
    if el.attr("disabled").is_some()
        || el
            .attr("aria-disabled")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
        || has_disabled_class(element)
    {
        return true;
    }
    element
        .parent()
        .and_then(ElementRef::wrap)
        .is_some_and(has_disabled_class)
}

fn control_text(element: ElementRef<'_>) -> String {
    let text = element_text(element);
    if text.is_empty() && element.value().name() == "input" {
        element.value().attr("value").unwrap_or_default().trim().to_string()
    } else {
        text
    }
}

/// Find the next-page control on page `page_num`, if any.
pub fn detect_next_control(document: &Html, page_num: usize, rules: &PaginationRules) -> Option<NextControl> {
    let next_number = (page_num + 1).to_string();

    for rule in &rules.rules {
        for (index, element) in document.select(&rule.selector).enumerate() {
            if is_disabled(element) {
                continue;
            }
            let matched = match &rule.matcher {
                CompiledMatcher::Any => true,
                CompiledMatcher::Text(re) => re.is_match(&control_text(element)),
                CompiledMatcher::Attr(name, re) => {
                    element.value().attr(name).is_some_and(|v| re.is_match(v.trim()))
                }
                CompiledMatcher::NextNumber => control_text(element) == next_number,
            };
            if matched {
                return Some(NextControl {
                    rule: rule.name.clone(),
                    selector: rule.selector_text.clone(),
                    index,
                });
            }
        }
    }
    None
}

/// Timing and limits for one pagination run.
#[derive(Debug, Clone)]
pub struct PaginationOptions {
    pub max_pages: usize,
    pub network_idle_timeout: Duration,
    pub request_delay: Duration,
}

/// Records accumulated over every page of a section.
#[derive(Debug, Default)]
pub struct PaginatedSection {
    pub pages: usize,
    pub tables: Vec<ExtractedTable>,
    pub forms: Vec<ExtractedForm>,
    pub links: Vec<ExtractedLink>,
    pub images: Vec<ExtractedImage>,
}

/// Walk a section's pages starting from the already-loaded `first_html`.
///
/// Only failures on the first page propagate. Anything going wrong while
/// advancing ends the loop with what has been collected.
pub async fn paginate(
    session: &mut dyn BrowserSession,
    layout: &ExportLayout,
    section: &str,
    first_html: String,
    base_host: &str,
    rules: &PaginationRules,
    options: &PaginationOptions,
) -> Result<PaginatedSection, ExportError> {
    let mut result = PaginatedSection::default();
    let mut html = first_html;
    let mut page_num = 1;

    loop {
        let page_url = session.current_url().await.unwrap_or_default();
        let page = extract_page(&html, &page_url, base_host);
        debug!(
            "{} page {}: {} table(s), {} link(s)",
            section,
            page_num,
            page.tables.len(),
            page.links.len()
        );
        result.tables.extend(page.tables);
        result.forms.extend(page.forms);
        result.links.extend(page.links);
        result.images.extend(page.images);
        result.pages = page_num;

        if let Err(e) = write_file(&layout.page_snapshot_path(section, page_num), &html) {
            if page_num == 1 {
                return Err(e.into());
            }
            warn!("{}: pagination stopped on page {}: {}", section, page_num, e);
            break;
        }

        if page_num >= options.max_pages {
            info!("{}: reached page cap ({})", section, options.max_pages);
            break;
        }

        let control = {
            let document = Html::parse_document(&html);
            detect_next_control(&document, page_num, rules)
        };
        let Some(control) = control else {
            debug!("{}: no next control on page {}", section, page_num);
            break;
        };

        debug!(
            "{}: next via {} ({} #{})",
            section, control.rule, control.selector, control.index
        );
        if let Err(e) = session.click(&control.selector, control.index).await {
            warn!("{}: pagination stopped on page {}: {}", section, page_num, e);
            break;
        }
        session.wait_for_idle(options.network_idle_timeout).await;
        tokio::time::sleep(options.request_delay).await;

        html = match session.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!("{}: lost page after click on page {}: {}", section, page_num, e);
                break;
            }
        };
        page_num += 1;
    }

    if result.pages > 1 {
        info!("{}: {} page(s)", section, result.pages);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(html: &str, page_num: usize) -> Option<NextControl> {
        detect_next_control(&Html::parse_document(html), page_num, &PaginationRules::defaults())
    }

    #[test]
    fn test_defaults_compile() {
        assert_eq!(PaginationRules::defaults().len(), default_rules().len());
    }

    #[test]
    fn test_next_text_link() {
        let c = detect(r##"<a href="#">Prev</a><a href="/p">Home</a><a href="#" class="x">Next &raquo;</a>"##, 1).unwrap();
        assert_eq!(c.rule, "next_link");
        assert_eq!(c.selector, "a");
        assert_eq!(c.index, 2);
    }

    #[test]
    fn test_disabled_controls_skipped() {
        assert_eq!(detect(r#"<a class="disabled">Next</a>"#, 1), None);
        assert_eq!(detect(r#"<a aria-disabled="true">Next</a>"#, 1), None);
        assert_eq!(detect(r#"<li class="disabled"><a>Next</a></li>"#, 1), None);
        assert_eq!(detect(r#"<button disabled>Next</button>"#, 1), None);
    }

    #[test]
    fn test_input_button_value() {
        let c = detect(r#"<form><input type="submit" value="Next"></form>"#, 1).unwrap();
        assert_eq!(c.rule, "next_button");
    }

    #[test]
    fn test_rel_and_aria() {
        let c = detect(r#"<a rel="next" href="/p2">2</a>"#, 1).unwrap();
        assert_eq!(c.rule, "rel_next");
        let c = detect(r#"<button aria-label="Next page"><svg></svg></button>"#, 1).unwrap();
        assert_eq!(c.rule, "aria_next");
    }

    #[test]
    fn test_numbered_fallback_uses_current_page() {
        let html = r#"<div class="pagination"><a>1</a><a>2</a><a>3</a></div>"#;
        let c = detect(html, 2).unwrap();
        assert_eq!(c.rule, "numbered");
        assert_eq!(c.index, 2);
        assert_eq!(detect(html, 3), None);
    }

    #[test]
    fn test_text_rule_wins_over_numbers() {
        let html = r#"<div class="pagination"><a>1</a><a>2</a><a>Next</a></div>"#;
        assert_eq!(detect(html, 1).unwrap().rule, "next_link");
    }

    #[test]
    fn test_unrelated_text_does_not_match() {
        assert_eq!(detect(r#"<a>Next steps for this job</a><a>Context</a>"#, 1), None);
    }

    #[test]
    fn test_custom_rules() {
        let rules = PaginationRules::compile(&[PaginationRule::new(
            "load_more",
            "span.more",
            Matcher::Text {
                pattern: "(?i)load more".into(),
            },
        )])
        .unwrap();
        let doc = Html::parse_document(r#"<span class="more">Load more</span>"#);
        assert_eq!(detect_next_control(&doc, 1, &rules).unwrap().rule, "load_more");
    }

    #[test]
    fn test_bad_rules_rejected() {
        let bad_selector = PaginationRule::new("x", "a[", Matcher::Any);
        assert!(matches!(
            PaginationRules::compile(&[bad_selector]),
            Err(RuleError::Selector { .. })
        ));
        let bad_regex = PaginationRule::new("y", "a", Matcher::Text { pattern: "(".into() });
        assert!(matches!(
            PaginationRules::compile(&[bad_regex]),
            Err(RuleError::Regex { .. })
        ));
    }

    #[test]
    fn test_rules_deserialize() {
        let rules: Vec<PaginationRule> = toml::from_str::<toml::Table>(
            r#"
            [[rules]]
            name = "more"
            selector = "a.more"
            matcher = { type = "attr", name = "data-page", pattern = "next" }
            "#,
        )
        .unwrap()["rules"]
            .clone()
            .try_into()
            .unwrap();
        assert_eq!(
            rules[0].matcher,
            Matcher::Attr {
                name: "data-page".into(),
                pattern: "next".into()
            }
        );
    }
}
