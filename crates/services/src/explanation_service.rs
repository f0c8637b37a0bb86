use std::sync::Arc;

use exam_core::model::{ProviderKind, Question};

use crate::ai::{GenerateRequest, ModelClient, ProviderConfig, build_client};
use crate::app_settings_service::AppSettingsService;
use crate::error::ExplanationError;
use crate::extraction::prompts;

/// Builds a client for a resolved provider configuration.
pub type ClientFactory = Arc<dyn Fn(ProviderConfig) -> Arc<dyn ModelClient> + Send + Sync>;

/// Asks a remote model to verify and explain a question's stored answer.
#[derive(Clone)]
pub struct ExplanationService {
    settings: Arc<AppSettingsService>,
    connect: ClientFactory,
}

impl ExplanationService {
    #[must_use]
    pub fn new(settings: Arc<AppSettingsService>) -> Self {
        Self {
            settings,
            connect: Arc::new(build_client),
        }
    }

    #[must_use]
    pub fn with_client_factory(mut self, connect: ClientFactory) -> Self {
        self.connect = connect;
        self
    }

    /// Explain using the preferred provider.
    ///
    /// # Errors
    ///
    /// See [`Self::explain_with`].
    pub async fn explain(&self, question: &Question) -> Result<String, ExplanationError> {
        let provider = self.settings.load().await?.provider();
        self.explain_with(provider, question).await
    }

    /// Explain using `provider` and its configured model.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` when no key is available and
    /// `CredentialInvalid` when the provider rejects it (the stored key is
    /// forgotten). Other provider failures are returned as is and may be retried.
    pub async fn explain_with(
        &self,
        provider: ProviderKind,
        question: &Question,
    ) -> Result<String, ExplanationError> {
        let config = self
            .settings
            .provider_config(provider)
            .await?
            .ok_or_else(|| ExplanationError::MissingCredential(provider.to_string()))?;
        let client = (self.connect)(config);

        let request = GenerateRequest::text(prompts::explanation(
            question.prompt(),
            question.options(),
            question.answer(),
        ))
        .with_system(prompts::EXPLANATION_SYSTEM);

        tracing::debug!(provider = %provider, model = client.model(), question = %question.id(), "requesting explanation");
        match client.generate(&request).await {
            Ok(text) if text.trim().is_empty() => Err(ExplanationError::EmptyResponse),
            Ok(text) => Ok(text),
            Err(err) if err.is_auth() => {
                tracing::warn!(provider = %provider, error = %err, "credential rejected");
                self.settings.forget_credential(provider).await?;
                Err(ExplanationError::CredentialInvalid(provider.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
