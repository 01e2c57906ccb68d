//! Work-time statistics over completed assignments.
//!
//! The db layer fetches per-assignment second counts; the math happens
//! here because median is not portable SQL. Median truncates to a whole
//! second, matching the legacy result files.

use serde::Serialize;

/// Mean/median/total work time for a set of completed assignments.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct WorkTimeStats {
    pub completed_assignments: usize,
    pub mean_seconds: f64,
    pub median_seconds: i64,
    pub total_seconds: i64,
}

impl WorkTimeStats {
    /// Compute statistics from per-assignment work times in seconds.
    /// All zeroes when `work_times` is empty.
    pub fn from_work_times(work_times: &[i64]) -> Self {
        if work_times.is_empty() {
            return Self::default();
        }

        let total: i64 = work_times.iter().sum();
        let mut sorted = work_times.to_vec();
        sorted.sort_unstable();

        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 1 {
            sorted[mid]
        } else {
            (sorted[mid - 1] + sorted[mid]) / 2
        };

        Self {
            completed_assignments: work_times.len(),
            mean_seconds: total as f64 / work_times.len() as f64,
            median_seconds: median,
            total_seconds: total,
        }
    }
}

/// Format a second count as `Xh Ym` for user-facing stats pages.
pub fn format_seconds(seconds: i64) -> String {
    format!("{}h {}m", seconds / 3600, (seconds / 60) % 60)
}
