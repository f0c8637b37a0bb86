//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{AppSettingsError, QuestionError, QuestionId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Validation failures of the exam session state machine.
///
/// Persistence problems are recovered by the caller and never appear here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("option index {index} is out of range")]
    InvalidOption { index: usize },
    #[error("index {index} is outside the {len} active questions")]
    OutOfBounds { index: usize, len: usize },
    #[error("no questions match the selected themes")]
    Empty,
    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),
    #[error("session already completed")]
    Completed,
    #[error("session is not awaiting finish confirmation")]
    NotReviewPending,
    #[error("session is awaiting finish confirmation")]
    NotInProgress,
}

/// Errors emitted by `SessionLoopService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionLoopError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by remote provider clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("provider rejected the credential ({0})")]
    Unauthorized(String),
    #[error("provider rate limit reached, retry later")]
    RateLimited,
    #[error("provider request failed with status {status}: {message}")]
    HttpStatus {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("provider returned an empty response")]
    EmptyResponse,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// True when the failure means the credential must be re-entered.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        match self {
            Self::Unauthorized(_) => true,
            Self::HttpStatus { message, .. } => looks_like_auth_failure(message),
            _ => false,
        }
    }
}

/// Error text patterns providers use for rejected credentials.
pub(crate) fn looks_like_auth_failure(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("401") || lower.contains("permission denied") || lower.contains("api key")
}

/// Why a single chunk or page response could not be decoded.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractionParseError {
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response contains no question array")]
    NoQuestionArray,
}

/// Terminal outcomes of an extraction run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractionError {
    #[error("nothing to extract from")]
    MissingInput,
    #[error("credential rejected, re-authenticate and retry: {0}")]
    Unauthorized(String),
    #[error("rate limited by the provider, retry later")]
    RateLimited,
    #[error("{0} cannot read page images")]
    ImagesUnsupported(String),
    #[error("no questions extracted ({failed} of {attempted} requests failed)")]
    NothingExtracted { attempted: usize, failed: usize },
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

/// Errors emitted by `ExplanationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExplanationError {
    #[error("no credential stored for {0}")]
    MissingCredential(String),
    #[error("credential for {0} was rejected and has been forgotten")]
    CredentialInvalid(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("explanation was empty")]
    EmptyResponse,
    #[error(transparent)]
    Settings(#[from] AppSettingsServiceError),
}

/// Errors emitted by `QuestionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionServiceError {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AppSettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppSettingsServiceError {
    #[error(transparent)]
    Settings(#[from] AppSettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Questions(#[from] QuestionServiceError),
}
