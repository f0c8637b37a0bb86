mod app_settings;
mod history;
mod ids;
mod question;
mod score;
mod session;
mod theme;

pub use app_settings::{
    AppSettings, AppSettingsDraft, AppSettingsError, Appearance, DEFAULT_GEMINI_MODEL,
    DEFAULT_GROQ_MODEL, ProviderKind,
};
pub use history::AttemptRecord;
pub use ids::{AttemptId, ParseIdError, QuestionId};
pub use question::{
    DEFAULT_THEME, MISSING_OPTION, OPTION_COUNT, Question, QuestionDraft, QuestionError,
    QuestionPatch, ValidatedQuestion, answer_from_label, option_label,
};
pub use score::{
    MissedQuestion, PASS_PERCENTAGE, PerformanceAnalysis, ScoreReport, ThemeStats,
    WEAK_THEME_PERCENTAGE,
};
pub use session::{
    AnswerMap, EXAM_DURATION_SECS, FlagSet, PracticeSnapshot, SessionMode, SessionPhase,
};
pub use theme::{ALL_THEMES, ThemeFilter, distinct_themes};
