//! Keys used in the key-value store.

use exam_core::model::ProviderKind;

/// In-progress practice attempt (`PracticeSnapshot`).
pub const PRACTICE_STATE: &str = "practiceState";

/// Latest exam answers keyed by question id.
pub const USER_ANSWERS: &str = "exit-exam-userAnswers";

/// Flagged question ids.
pub const FLAGGED: &str = "exit-exam-flagged";

/// How the question set was initialised (`default` or `clean`).
pub const QUESTION_SET_MODE: &str = "question_set_mode";

/// Built-in question ids that were seeded at least once. A deleted built-in
/// is not seeded again.
pub const SEEDED_BUILTINS: &str = "seeded_builtin_questions";

pub const APP_SETTINGS: &str = "app_settings";

/// Completed attempts, newest last.
pub const EXAM_HISTORY: &str = "exam_history";

/// Credential slot for a provider. Each provider keeps its own key.
#[must_use]
pub fn credential_key(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Gemini => "gemini_api_key",
        ProviderKind::Groq => "groq_api_key",
    }
}
