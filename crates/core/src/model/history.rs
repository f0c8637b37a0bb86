use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::AttemptId;
use crate::model::score::ScoreReport;
use crate::model::session::SessionMode;
use crate::model::theme::ThemeFilter;

/// Summary of a completed attempt, kept in the exam history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub id: AttemptId,
    pub mode: SessionMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub score: ScoreReport,
    /// True when the exam ended because the clock ran out.
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub themes: ThemeFilter,
}

impl AttemptRecord {
    /// Seconds between start and completion, never negative.
    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        u64::try_from((self.completed_at - self.started_at).num_seconds()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn record_serializes_with_camel_case_and_reports_elapsed() {
        let record = AttemptRecord {
            id: AttemptId::generate(),
            mode: SessionMode::Exam,
            started_at: fixed_now(),
            completed_at: fixed_now() + Duration::minutes(90),
            score: ScoreReport {
                score: 3,
                total: 4,
                percentage: 75,
                passed: true,
            },
            timed_out: false,
            themes: ThemeFilter::all(),
        };
        assert_eq!(record.elapsed_secs(), 5400);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["mode"], "exam");
        assert_eq!(json["score"]["percentage"], 75);
        assert!(json.get("timedOut").is_some());

        let back: AttemptRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
