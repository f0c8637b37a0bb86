//! Remote text-generation clients used for extraction and explanations.

mod gemini;
mod groq;

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use exam_core::model::ProviderKind;

use crate::error::{ProviderError, looks_like_auth_failure};

pub use gemini::{DEFAULT_GEMINI_BASE_URL, GeminiClient};
pub use groq::{DEFAULT_GROQ_BASE_URL, GroqClient};

/// A rendered page sent to a multimodal model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl PageImage {
    #[must_use]
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }
}

/// One prompt for a remote model.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub image: Option<PageImage>,
    /// Ask the provider for a JSON response when it supports that.
    pub json: bool,
    pub temperature: f32,
}

impl GenerateRequest {
    #[must_use]
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            image: None,
            json: false,
            temperature: 0.3,
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: PageImage) -> Self {
        self.image = Some(image);
        self
    }

    #[must_use]
    pub fn expect_json(mut self) -> Self {
        self.json = true;
        self.temperature = 0.1;
        self
    }
}

/// Contract shared by the remote providers.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn provider(&self) -> ProviderKind;

    fn model(&self) -> &str;

    /// Send a prompt and return the generated text, trimmed.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` when the request fails or the reply is empty.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError>;

    /// Names of the models available to the credential.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` when the request fails.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;
}

/// Endpoint, credential and model for one provider.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(kind: ProviderKind, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = match kind {
            ProviderKind::Gemini => DEFAULT_GEMINI_BASE_URL,
            ProviderKind::Groq => DEFAULT_GROQ_BASE_URL,
        };
        Self {
            kind,
            base_url: base_url.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Read `EXAM_<PROVIDER>_API_KEY`, `_MODEL` and `_BASE_URL`.
    ///
    /// Returns `None` when no key is set.
    #[must_use]
    pub fn from_env(kind: ProviderKind) -> Option<Self> {
        let prefix = format!("EXAM_{}", kind.as_str().to_ascii_uppercase());
        let api_key = env::var(format!("{prefix}_API_KEY")).ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let model =
            env::var(format!("{prefix}_MODEL")).unwrap_or_else(|_| kind.default_model().into());
        let mut config = Self::new(kind, api_key.trim(), model);
        if let Ok(base_url) = env::var(format!("{prefix}_BASE_URL")) {
            config.base_url = base_url;
        }
        Some(config)
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Build the client matching the configured provider.
#[must_use]
pub fn build_client(config: ProviderConfig) -> Arc<dyn ModelClient> {
    match config.kind {
        ProviderKind::Gemini => Arc::new(GeminiClient::new(config)),
        ProviderKind::Groq => Arc::new(GroqClient::new(config)),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Classify a failed response.
pub(crate) async fn error_for_response(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_failure(status, &body)
}

pub(crate) fn classify_failure(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status.as_u16() {
        401 | 403 => ProviderError::Unauthorized(message),
        429 => ProviderError::RateLimited,
        _ if looks_like_auth_failure(&message) => ProviderError::Unauthorized(message),
        _ => ProviderError::HttpStatus { status, message },
    }
}
