//! HTML template processing.
//!
//! Templates carry `${name}` placeholders that are filled from a task's
//! input fields. On every create/update the template is re-scanned: the
//! placeholder set is derived, the presence of a submit control is
//! recorded, and the template is rejected if it has no response-capable
//! element or exceeds the configured size limit.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CoreError, CoreResult};

/// Default template size limit in bytes. Overridable via site config.
pub const DEFAULT_TEMPLATE_SIZE_LIMIT: usize = 64 * 1024;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\w+)\}").expect("placeholder regex"));

static RESPONSE_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*(input|select|textarea)\b").expect("field regex"));

static SUBMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<\s*(input|button)\b[^>]*\btype\s*=\s*["']?submit"#).expect("submit regex")
});

/// Derived properties of an HTML template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInfo {
    /// Unique `${name}` placeholder names, sorted.
    pub fieldnames: BTreeSet<String>,
    /// Whether the template contains an `<input type=submit>` or
    /// `<button type=submit>` control.
    pub has_submit_button: bool,
}

/// Validate a template and derive its field names.
///
/// Fails when the template is over `size_limit` bytes or contains no
/// input, select, or textarea element.
pub fn process_template(html: &str, size_limit: usize) -> CoreResult<TemplateInfo> {
    if html.len() > size_limit {
        return Err(CoreError::Validation("Template is too large".into()));
    }

    if !RESPONSE_FIELD_RE.is_match(html) {
        return Err(CoreError::Validation(
            "Template does not contain any fields for responses. \
             Please include at least one field (input, select, or textarea). \
             This usually means you are generating HTML with JavaScript. \
             If so, add an unused hidden input."
                .into(),
        ));
    }

    let fieldnames = extract_fieldnames(html);
    let has_submit_button = SUBMIT_RE.is_match(html);

    Ok(TemplateInfo {
        fieldnames,
        has_submit_button,
    })
}

/// Extract the unique `${name}` placeholder names from a template.
pub fn extract_fieldnames(html: &str) -> BTreeSet<String> {
    PLACEHOLDER_RE
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .collect()
}

/// Replace each `${field}` placeholder with its value from `fields`.
///
/// Placeholders without a matching field are left untouched, matching the
/// behaviour workers see when a CSV column is absent for a task.
pub fn populate(html: &str, fields: &[(String, String)]) -> String {
    let mut result = html.to_string();
    for (name, value) in fields {
        result = result.replace(&format!("${{{name}}}"), value);
    }
    result
}
