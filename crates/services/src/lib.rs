#![forbid(unsafe_code)]

pub mod ai;
pub mod app_services;
pub mod app_settings_service;
mod builtin;
pub mod error;
pub mod explanation_service;
pub mod extraction;
pub mod question_service;
pub mod sessions;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use app_settings_service::AppSettingsService;
pub use error::{
    AppServicesError, AppSettingsServiceError, ExplanationError, ExtractionError,
    ExtractionParseError, ProviderError, QuestionServiceError, SessionError, SessionLoopError,
};
pub use explanation_service::ExplanationService;
pub use extraction::{ExtractionPipeline, ExtractionReport, PatternParser};
pub use question_service::{ImportOutcome, QuestionService, QuestionSetMode};
pub use sessions::{ExamSession, ExamTimer, SessionLoopService, SessionStore};
