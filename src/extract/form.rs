//! Form extraction.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::text::{element_text, resolve};
use crate::models::{ExtractedForm, FormField, SelectOption};

static FORM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());
static FIELD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input, select, textarea").unwrap());
static OPTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());

/// Extract forms that have at least one field worth keeping.
///
/// `formIndex` counts every form on the page, so indices may skip numbers
/// when fieldless forms are dropped.
pub fn extract_forms(document: &Html, page_url: Option<&Url>) -> Vec<ExtractedForm> {
    document
        .select(&FORM)
        .enumerate()
        .filter_map(|(index, form)| {
            let fields: Vec<FormField> = form.select(&FIELD).filter_map(extract_field).collect();
            if fields.is_empty() {
                return None;
            }

            let action = match form.value().attr("action").map(str::trim) {
                Some(action) if !action.is_empty() => resolve(page_url, action)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| action.to_string()),
                _ => page_url.map(|u| u.to_string()).unwrap_or_default(),
            };
            let method = form
                .value()
                .attr("method")
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "get".to_string());

            Some(ExtractedForm {
                form_index: index,
                action,
                method,
                fields,
            })
        })
        .collect()
}

fn field_name(element: ElementRef<'_>) -> String {
    element
        .value()
        .attr("name")
        .or_else(|| element.value().attr("id"))
        .unwrap_or_default()
        .to_string()
}

/// Returns `None` for passwords and empty hidden inputs.
fn extract_field(element: ElementRef<'_>) -> Option<FormField> {
    let name = field_name(element);

    match element.value().name() {
        "select" => {
            let options: Vec<SelectOption> = element
                .select(&OPTION)
                .map(|opt| {
                    let text = element_text(opt);
                    SelectOption {
                        value: opt
                            .value()
                            .attr("value")
                            .map(str::to_string)
                            .unwrap_or_else(|| text.clone()),
                        text,
                        selected: opt.value().attr("selected").is_some(),
                    }
                })
                .collect();
            // Single selects show the first option when none is marked.
            let current = options
                .iter()
                .find(|o| o.selected)
                .or_else(|| options.first());
            Some(FormField {
                name,
                field_type: "select".to_string(),
                value: current.map(|o| o.value.clone()).unwrap_or_default(),
                selected_text: Some(current.map(|o| o.text.clone()).unwrap_or_default()),
                options: Some(options),
                checked: None,
            })
        }
        "textarea" => Some(FormField {
            name,
            field_type: "textarea".to_string(),
            value: element.text().collect(),
            ..Default::default()
        }),
        _ => {
            let field_type = element
                .value()
                .attr("type")
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "text".to_string());
            let value = element.value().attr("value").unwrap_or_default();

            if field_type == "password" || (field_type == "hidden" && value.is_empty()) {
                return None;
            }

            let checked = matches!(field_type.as_str(), "checkbox" | "radio")
                .then(|| element.value().attr("checked").is_some());
            let value = if checked.is_some() && value.is_empty() {
                "on".to_string()
            } else {
                value.to_string()
            };

            Some(FormField {
                name,
                field_type,
                value,
                checked,
                ..Default::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forms(html: &str) -> Vec<ExtractedForm> {
        let doc = Html::parse_document(html);
        let base = Url::parse("https://app.example.com/jobs/edit.cfm?id=3").unwrap();
        extract_forms(&doc, Some(&base))
    }

    #[test]
    fn test_drops_passwords_and_empty_hidden() {
        let f = forms(
            r#"<form action="save.cfm" method="POST">
                <input type="hidden" name="csrf" value="">
                <input type="hidden" name="jobId" value="3">
                <input type="password" name="pw" value="secret">
                <input name="title" value="Deck">
            </form>"#,
        );
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].action, "https://app.example.com/jobs/save.cfm");
        assert_eq!(f[0].method, "post");
        let names: Vec<&str> = f[0].fields.iter().map(|x| x.name.as_str()).collect();
        assert_eq!(names, vec!["jobId", "title"]);
        assert_eq!(f[0].fields[1].field_type, "text");
    }

    #[test]
    fn test_select_captures_options() {
        let f = forms(
            r#"<form><select name="status">
                <option value="o">Open</option>
                <option value="c" selected>Closed</option>
            </select></form>"#,
        );
        let field = &f[0].fields[0];
        assert_eq!(field.field_type, "select");
        assert_eq!(field.value, "c");
        assert_eq!(field.selected_text.as_deref(), Some("Closed"));
        assert_eq!(field.options.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_select_defaults_to_first_option() {
        let f = forms(r#"<form><select name="s"><option>A</option><option>B</option></select></form>"#);
        assert_eq!(f[0].fields[0].value, "A");
        assert_eq!(f[0].fields[0].selected_text.as_deref(), Some("A"));
    }

    #[test]
    fn test_textarea_and_checkbox() {
        let f = forms(
            r#"<form><textarea name="notes">line one
line two</textarea><input type="checkbox" name="done" checked></form>"#,
        );
        assert_eq!(f[0].fields[0].field_type, "textarea");
        assert!(f[0].fields[0].value.contains("line two"));
        assert_eq!(f[0].fields[1].checked, Some(true));
        assert_eq!(f[0].fields[1].value, "on");
    }

    #[test]
    fn test_fieldless_forms_omitted_and_index_kept() {
        let f = forms(
            r#"<form id="empty"><input type="password" name="p"></form>
               <form><input name="q"></form>"#,
        );
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].form_index, 1);
        assert_eq!(f[0].action, "https://app.example.com/jobs/edit.cfm?id=3");
        assert_eq!(f[0].method, "get");
    }
}
