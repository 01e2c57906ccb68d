//! Results and input CSV assembly.
//!
//! Result files mimic the legacy MTurk column conventions: a fixed block
//! of metadata columns, then `Input.<field>` for every input field seen
//! across the exported tasks, then `Answer.<field>` for every answer
//! field seen across the exported completed assignments (each group
//! sorted alphabetically), then the worker username. Every field is
//! quoted; the line terminator defaults to CRLF with an LF option for
//! unix tooling.
//!
//! Only completed assignments contribute result rows. The exporter works
//! on rows already materialized by the db layer so the column set is
//! computed over exactly the exported data, never a live queryset.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::types::{DbId, Timestamp};

/// Legacy result-file timestamp format, e.g. `Mon Feb 03 14:00:00 UTC 2025`.
const TIME_FORMAT: &str = "%a %b %d %H:%M:%S %Z %Y";

/// Fixed metadata columns preceding the dynamic `Input.*`/`Answer.*` set.
const METADATA_COLUMNS: [&str; 11] = [
    "HITId",
    "HITTypeId",
    "Title",
    "CreationTime",
    "MaxAssignments",
    "AssignmentDurationInSeconds",
    "AssignmentId",
    "WorkerId",
    "AcceptTime",
    "SubmitTime",
    "WorkTimeInSeconds",
];

/// Trailing column carrying the worker's username, when authenticated.
const USERNAME_COLUMN: &str = "Worker.Username";

/// Line terminator for generated CSV files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    /// `\r\n`, the legacy result-file default.
    #[default]
    Windows,
    /// `\n`.
    Unix,
}

impl From<LineTerminator> for csv::Terminator {
    fn from(value: LineTerminator) -> Self {
        match value {
            LineTerminator::Windows => csv::Terminator::CRLF,
            LineTerminator::Unix => csv::Terminator::Any(b'\n'),
        }
    }
}

/// One completed assignment joined with its task, batch, and project,
/// ready for export.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub task_id: DbId,
    pub project_id: DbId,
    pub project_name: String,
    pub batch_created_at: Timestamp,
    pub assignments_per_task: i32,
    /// Batch allotted assignment time, in hours.
    pub allotted_hours: i32,
    pub assignment_id: DbId,
    pub worker_id: Option<DbId>,
    pub worker_username: Option<String>,
    pub accepted_at: Timestamp,
    pub submitted_at: Timestamp,
    pub input_fields: HashMap<String, String>,
    pub answers: HashMap<String, String>,
}

impl ResultRow {
    /// Seconds elapsed between acceptance and submission.
    pub fn work_time_in_seconds(&self) -> i64 {
        (self.submitted_at - self.accepted_at).num_seconds()
    }
}

/// Render the results CSV for a set of completed assignments.
pub fn results_csv(rows: &[ResultRow], terminator: LineTerminator) -> CoreResult<Vec<u8>> {
    let mut input_fields = BTreeSet::new();
    let mut answer_fields = BTreeSet::new();
    for row in rows {
        input_fields.extend(row.input_fields.keys().cloned());
        answer_fields.extend(row.answers.keys().cloned());
    }

    let mut writer = csv_writer(terminator);

    let header: Vec<String> = METADATA_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(input_fields.iter().map(|f| format!("Input.{f}")))
        .chain(answer_fields.iter().map(|f| format!("Answer.{f}")))
        .chain([USERNAME_COLUMN.to_string()])
        .collect();
    writer.write_record(&header).map_err(csv_error)?;

    for row in rows {
        let mut record: Vec<String> = vec![
            row.task_id.to_string(),
            row.project_id.to_string(),
            row.project_name.clone(),
            row.batch_created_at.format(TIME_FORMAT).to_string(),
            row.assignments_per_task.to_string(),
            (i64::from(row.allotted_hours) * 3600).to_string(),
            row.assignment_id.to_string(),
            row.worker_id.map(|id| id.to_string()).unwrap_or_default(),
            row.accepted_at.format(TIME_FORMAT).to_string(),
            row.submitted_at.format(TIME_FORMAT).to_string(),
            row.work_time_in_seconds().to_string(),
        ];
        for field in &input_fields {
            record.push(row.input_fields.get(field).cloned().unwrap_or_default());
        }
        for field in &answer_fields {
            record.push(row.answers.get(field).cloned().unwrap_or_default());
        }
        record.push(row.worker_username.clone().unwrap_or_default());
        writer.write_record(&record).map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| CoreError::Internal(format!("CSV write failed: {e}")))
}

/// Render the input-only CSV for a set of tasks, independent of
/// completion state.
///
/// The column set is the union of input field names across the tasks;
/// rows missing a field emit an empty cell. Column order may differ from
/// the originally uploaded file.
pub fn input_csv(
    tasks: &[HashMap<String, String>],
    terminator: LineTerminator,
) -> CoreResult<Vec<u8>> {
    if tasks.is_empty() {
        return Ok(Vec::new());
    }

    let mut fields = BTreeSet::new();
    for task in tasks {
        fields.extend(task.keys().cloned());
    }

    let mut writer = csv_writer(terminator);
    writer
        .write_record(fields.iter())
        .map_err(csv_error)?;
    for task in tasks {
        let record: Vec<&str> = fields
            .iter()
            .map(|f| task.get(f).map(String::as_str).unwrap_or(""))
            .collect();
        writer.write_record(&record).map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| CoreError::Internal(format!("CSV write failed: {e}")))
}

/// Download filename for a batch's results file, deviating from MTurk's
/// naming: `Project-{pid}_Batch-{bid}-{stem}_results{ext}`.
pub fn results_filename(project_id: DbId, batch_id: DbId, batch_filename: &str) -> String {
    let path = Path::new(batch_filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("Project-{project_id}_Batch-{batch_id}-{stem}_results{extension}")
}

fn csv_writer(terminator: LineTerminator) -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(terminator.into())
        .from_writer(Vec::new())
}

fn csv_error(e: csv::Error) -> CoreError {
    CoreError::Internal(format!("CSV write failed: {e}"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_row() -> ResultRow {
        let accepted = chrono::Utc.with_ymd_and_hms(2025, 2, 3, 14, 0, 0).unwrap();
        ResultRow {
            task_id: 11,
            project_id: 3,
            project_name: "Spelling".into(),
            batch_created_at: accepted,
            assignments_per_task: 2,
            allotted_hours: 24,
            assignment_id: 21,
            worker_id: Some(7),
            worker_username: Some("ann".into()),
            accepted_at: accepted,
            submitted_at: accepted + chrono::Duration::seconds(90),
            input_fields: HashMap::from([("word".to_string(), "cat".to_string())]),
            answers: HashMap::from([("correct".to_string(), "yes".to_string())]),
        }
    }

    #[test]
    fn header_groups_are_sorted_and_ordered() {
        let mut row = sample_row();
        row.input_fields
            .insert("language".to_string(), "en".to_string());
        let bytes = results_csv(&[row], LineTerminator::Unix).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            "\"HITId\",\"HITTypeId\",\"Title\",\"CreationTime\",\"MaxAssignments\",\
             \"AssignmentDurationInSeconds\",\"AssignmentId\",\"WorkerId\",\"AcceptTime\",\
             \"SubmitTime\",\"WorkTimeInSeconds\",\"Input.language\",\"Input.word\",\
             \"Answer.correct\",\"Worker.Username\""
        );
    }

    #[test]
    fn row_values_and_work_time() {
        let bytes = results_csv(&[sample_row()], LineTerminator::Unix).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.contains("\"90\""), "{row}");
        assert!(row.contains("\"86400\""), "{row}");
        assert!(row.contains("\"Mon Feb 03 14:00:00 UTC 2025\""), "{row}");
        assert!(row.ends_with("\"ann\""), "{row}");
    }

    #[test]
    fn default_terminator_is_crlf() {
        let bytes = results_csv(&[sample_row()], LineTerminator::default()).unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("\r\n"));
    }

    #[test]
    fn anonymous_worker_emits_empty_cells() {
        let mut row = sample_row();
        row.worker_id = None;
        row.worker_username = None;
        let bytes = results_csv(&[row], LineTerminator::Unix).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.lines().nth(1).unwrap().ends_with("\"\""));
    }

    #[test]
    fn input_csv_round_trips_values() {
        let tasks = vec![
            HashMap::from([
                ("word".to_string(), "c\u{e9}lin\u{e9}".to_string()),
                ("language".to_string(), "fr".to_string()),
            ]),
            HashMap::from([("word".to_string(), "dog".to_string())]),
        ];
        let bytes = input_csv(&tasks, LineTerminator::Unix).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "\"language\",\"word\"");
        assert_eq!(lines.next().unwrap(), "\"fr\",\"c\u{e9}lin\u{e9}\"");
        assert_eq!(lines.next().unwrap(), "\"\",\"dog\"");
    }

    #[test]
    fn input_csv_of_no_tasks_is_empty() {
        assert!(input_csv(&[], LineTerminator::default()).unwrap().is_empty());
    }

    #[test]
    fn results_filename_convention() {
        assert_eq!(
            results_filename(3, 11, "words.csv"),
            "Project-3_Batch-11-words_results.csv"
        );
        assert_eq!(
            results_filename(3, 11, "words"),
            "Project-3_Batch-11-words_results"
        );
    }
}
