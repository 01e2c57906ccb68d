//! CSV parsing and validation for batch uploads.
//!
//! A batch upload is validated against the owning project's template
//! field set before any task is materialized:
//!
//! - every template field must appear in the CSV header (hard error,
//!   naming the missing fields);
//! - header fields absent from the template are allowed but reported
//!   back as warnings;
//! - every data row must have exactly as many fields as the header, with
//!   every offending line reported at once (the header is line 1, so the
//!   first data row is line 2).
//!
//! The reader runs in flexible mode with no field size limit, so ragged
//! rows reach our validator instead of erroring inside the parser and
//! large free-text cells are accepted. Blank lines are skipped without
//! counting as data rows.

use std::collections::BTreeSet;

use crate::error::{CoreError, CoreResult};

/// A validated CSV upload: the header, one zipped `(field, value)` row
/// per task to create, and any header fields unknown to the template.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub header: Vec<String>,
    pub rows: Vec<Vec<(String, String)>>,
    /// Header fields not present in the template. A soft warning only.
    pub extra_fields: Vec<String>,
}

/// Parse and validate `bytes` against a project's template field set.
pub fn parse_batch_csv(
    bytes: &[u8],
    template_fieldnames: &BTreeSet<String>,
) -> CoreResult<ParsedCsv> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = reader.records();

    let header: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(|e| CoreError::Validation(format!("Could not parse CSV: {e}")))?
            .iter()
            .map(str::to_string)
            .collect(),
        None => return Err(CoreError::Validation("The CSV file is empty".into())),
    };

    let mut errors = Vec::new();

    let header_fields: BTreeSet<&str> = header.iter().map(String::as_str).collect();
    let missing: Vec<&str> = template_fieldnames
        .iter()
        .map(String::as_str)
        .filter(|f| !header_fields.contains(f))
        .collect();
    if !missing.is_empty() {
        errors.push(format!(
            "The CSV file is missing fields that are in the HTML template. \
             These missing fields are: {}",
            missing.join(", ")
        ));
    }

    let extra_fields: Vec<String> = header
        .iter()
        .filter(|f| !template_fieldnames.contains(*f))
        .cloned()
        .collect();

    let expected_fields = header.len();
    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|e| CoreError::Validation(format!("Could not parse CSV: {e}")))?;
        // Line number from the parser, so blank lines and multi-line
        // quoted cells do not throw off the count. Header is line 1.
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() != expected_fields {
            errors.push(format!(
                "The CSV file header has {expected_fields} fields, but line {line} has {} fields",
                record.len()
            ));
            continue;
        }
        rows.push(
            header
                .iter()
                .zip(record.iter())
                .map(|(field, value)| (field.clone(), value.to_string()))
                .collect(),
        );
    }

    if !errors.is_empty() {
        return Err(CoreError::CsvValidation(errors));
    }

    Ok(ParsedCsv {
        header,
        rows,
        extra_fields,
    })
}
