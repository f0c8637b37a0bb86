use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;
use crate::model::theme::ThemeFilter;

/// Time budget of an exam attempt (3 hours).
pub const EXAM_DURATION_SECS: u32 = 3 * 60 * 60;

/// Selected option per answered question.
pub type AnswerMap = BTreeMap<QuestionId, usize>;

/// Questions marked for later review.
pub type FlagSet = BTreeSet<QuestionId>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Untimed, with immediate feedback.
    Practice,
    /// Timed, with feedback deferred until completion.
    Exam,
}

impl SessionMode {
    #[must_use]
    pub fn is_timed(self) -> bool {
        matches!(self, Self::Exam)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Practice => "practice",
            Self::Exam => "exam",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "practice" => Ok(Self::Practice),
            "exam" => Ok(Self::Exam),
            other => Err(format!("unknown session mode: {other}")),
        }
    }
}

/// Lifecycle of a started attempt.
///
/// "Not started" has no value of its own: it is the absence of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    InProgress,
    /// Exam only: the user asked to finish and must confirm.
    ReviewPending,
    Completed,
}

/// Persisted state of an in-progress practice attempt, used for resumption.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSnapshot {
    #[serde(alias = "currentIdx")]
    pub current_index: usize,
    #[serde(default, alias = "userAnswers")]
    pub answers: AnswerMap,
    #[serde(default)]
    pub selected_themes: ThemeFilter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let mut answers = AnswerMap::new();
        answers.insert(QuestionId::new(12), 3);
        let snapshot = PracticeSnapshot {
            current_index: 2,
            answers,
            selected_themes: ThemeFilter::from_themes(["Networks"]),
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["currentIndex"], 2);
        assert_eq!(json["answers"]["12"], 3);
        assert_eq!(json["selectedThemes"][0], "Networks");
    }

    #[test]
    fn snapshot_accepts_legacy_field_names() {
        let raw = r#"{"currentIdx":4,"userAnswers":{"7":1},"selectedThemes":["All"]}"#;
        let snapshot: PracticeSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.current_index, 4);
        assert_eq!(snapshot.answers.get(&QuestionId::new(7)), Some(&1));
        assert!(snapshot.selected_themes.is_all());
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Exam".parse::<SessionMode>().unwrap(), SessionMode::Exam);
        assert!("quiz".parse::<SessionMode>().is_err());
        assert!(SessionMode::Exam.is_timed());
        assert!(!SessionMode::Practice.is_timed());
    }
}
