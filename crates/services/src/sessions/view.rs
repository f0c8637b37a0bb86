use chrono::{DateTime, Utc};

use exam_core::model::{AttemptRecord, SessionMode};
use exam_core::time::format_clock;

/// Presentation-agnostic list item for a completed attempt.
///
/// Timestamps are left unformatted; the duration is rendered as `H:MM:SS`
/// because it is shown next to the exam clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptListItem {
    pub code: String,
    pub mode: SessionMode,
    pub completed_at: DateTime<Utc>,
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    pub passed: bool,
    pub timed_out: bool,
    pub duration: String,
}

impl AttemptListItem {
    #[must_use]
    pub fn from_record(record: &AttemptRecord) -> Self {
        let secs = u32::try_from(record.elapsed_secs()).unwrap_or(u32::MAX);
        Self {
            code: record.id.short_code(),
            mode: record.mode,
            completed_at: record.completed_at,
            score: record.score.score,
            total: record.score.total,
            percentage: record.score.percentage,
            passed: record.score.passed,
            timed_out: record.timed_out,
            duration: format_clock(secs),
        }
    }
}

/// Newest attempts first, at most `limit`.
#[must_use]
pub fn recent_attempts(history: &[AttemptRecord], limit: usize) -> Vec<AttemptListItem> {
    history
        .iter()
        .rev()
        .take(limit)
        .map(AttemptListItem::from_record)
        .collect()
}
