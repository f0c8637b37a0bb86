use std::sync::Arc;

use exam_core::model::ProviderKind;
use storage::repository::Storage;

use crate::Clock;
use crate::ai::{ModelClient, build_client};
use crate::app_settings_service::AppSettingsService;
use crate::error::{AppServicesError, AppSettingsServiceError};
use crate::explanation_service::ExplanationService;
use crate::question_service::QuestionService;
use crate::sessions::{SessionLoopService, SessionStore};

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    questions: Arc<QuestionService>,
    session_loop: Arc<SessionLoopService>,
    app_settings: Arc<AppSettingsService>,
    explanations: Arc<ExplanationService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and seed the question set.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or seeding fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock).await
    }

    /// Build services over an existing storage aggregate.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if seeding the question set fails.
    pub async fn from_storage(storage: Storage, clock: Clock) -> Result<Self, AppServicesError> {
        let questions = Arc::new(QuestionService::new(
            Arc::clone(&storage.questions),
            Arc::clone(&storage.kv),
        ));
        questions.load_or_seed().await?;

        let session_loop = Arc::new(SessionLoopService::new(
            clock,
            Arc::clone(&storage.questions),
            SessionStore::new(Arc::clone(&storage.kv)),
        ));
        let app_settings = Arc::new(AppSettingsService::new(Arc::clone(&storage.kv)));
        let explanations = Arc::new(ExplanationService::new(Arc::clone(&app_settings)));

        Ok(Self {
            questions,
            session_loop,
            app_settings,
            explanations,
        })
    }

    #[must_use]
    pub fn questions(&self) -> Arc<QuestionService> {
        Arc::clone(&self.questions)
    }

    #[must_use]
    pub fn session_loop(&self) -> Arc<SessionLoopService> {
        Arc::clone(&self.session_loop)
    }

    #[must_use]
    pub fn app_settings(&self) -> Arc<AppSettingsService> {
        Arc::clone(&self.app_settings)
    }

    #[must_use]
    pub fn explanations(&self) -> Arc<ExplanationService> {
        Arc::clone(&self.explanations)
    }

    /// Client for `provider` with the stored credential and model, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsServiceError` if settings cannot be read.
    pub async fn model_client(
        &self,
        provider: ProviderKind,
    ) -> Result<Option<Arc<dyn ModelClient>>, AppSettingsServiceError> {
        Ok(self
            .app_settings
            .provider_config(provider)
            .await?
            .map(build_client))
    }
}
