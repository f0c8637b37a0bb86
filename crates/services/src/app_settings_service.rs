use std::sync::Arc;

use exam_core::model::{AppSettings, AppSettingsDraft, ProviderKind};
use storage::keys;
use storage::repository::{KeyValueStore, load_json, save_json};

use crate::ai::ProviderConfig;
use crate::error::AppSettingsServiceError;

/// Preferences and per-provider credentials.
#[derive(Clone)]
pub struct AppSettingsService {
    kv: Arc<dyn KeyValueStore>,
}

impl AppSettingsService {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Load persisted settings (or defaults if missing).
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsServiceError` on storage failures or if the stored
    /// values no longer validate.
    pub async fn load(&self) -> Result<AppSettings, AppSettingsServiceError> {
        let draft: Option<AppSettingsDraft> = load_json(self.kv.as_ref(), keys::APP_SETTINGS).await?;
        match draft {
            Some(draft) => Ok(draft.validate()?),
            None => Ok(AppSettings::default()),
        }
    }

    /// Validate and persist new settings.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsServiceError` if validation fails or persistence fails.
    pub async fn save(
        &self,
        draft: AppSettingsDraft,
    ) -> Result<AppSettings, AppSettingsServiceError> {
        let settings = draft.validate()?;
        save_json(self.kv.as_ref(), keys::APP_SETTINGS, &settings.to_draft()).await?;
        Ok(settings)
    }

    /// Stored credential for `provider`, falling back to the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsServiceError::Storage` on storage failures.
    pub async fn credential(
        &self,
        provider: ProviderKind,
    ) -> Result<Option<String>, AppSettingsServiceError> {
        let stored = self
            .kv
            .get(keys::credential_key(provider))
            .await?
            .filter(|key| !key.trim().is_empty());
        Ok(stored.or_else(|| ProviderConfig::from_env(provider).map(|config| config.api_key)))
    }

    /// # Errors
    ///
    /// Returns `AppSettingsServiceError::Storage` on storage failures.
    pub async fn set_credential(
        &self,
        provider: ProviderKind,
        api_key: &str,
    ) -> Result<(), AppSettingsServiceError> {
        self.kv
            .set(keys::credential_key(provider), api_key.trim())
            .await?;
        Ok(())
    }

    /// Drop the stored credential so the user is asked again.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsServiceError::Storage` on storage failures.
    pub async fn forget_credential(
        &self,
        provider: ProviderKind,
    ) -> Result<(), AppSettingsServiceError> {
        self.kv.remove(keys::credential_key(provider)).await?;
        tracing::info!(provider = %provider, "credential forgotten");
        Ok(())
    }

    /// Full client configuration for `provider`, or `None` without a credential.
    ///
    /// The model comes from the saved settings; the environment may override
    /// the endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsServiceError` if settings or credentials cannot be read.
    pub async fn provider_config(
        &self,
        provider: ProviderKind,
    ) -> Result<Option<ProviderConfig>, AppSettingsServiceError> {
        let Some(api_key) = self.credential(provider).await? else {
            return Ok(None);
        };
        let settings = self.load().await?;
        let mut config = ProviderConfig::new(provider, api_key, settings.model_for(provider));
        if let Some(env) = ProviderConfig::from_env(provider) {
            config.base_url = env.base_url;
        }
        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::Appearance;
    use storage::repository::InMemoryRepository;

    fn service() -> AppSettingsService {
        AppSettingsService::new(Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn missing_settings_load_as_defaults() {
        let settings = service().load().await.unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[tokio::test]
    async fn saved_settings_round_trip() {
        let service = service();
        let draft = AppSettingsDraft {
            provider: Some("gemini".into()),
            gemini_model: Some("gemini-2.0-flash".into()),
            groq_model: None,
            appearance: Some("dark".into()),
        };
        let saved = service.save(draft).await.unwrap();
        let loaded = service.load().await.unwrap();
        assert_eq!(saved, loaded);
        assert_eq!(loaded.provider(), ProviderKind::Gemini);
        assert_eq!(loaded.active_model(), "gemini-2.0-flash");
        assert_eq!(loaded.appearance(), Appearance::Dark);
    }

    #[tokio::test]
    async fn invalid_settings_are_rejected() {
        let draft = AppSettingsDraft {
            provider: Some("openai".into()),
            ..AppSettingsDraft::new()
        };
        assert!(matches!(
            service().save(draft).await,
            Err(AppSettingsServiceError::Settings(_))
        ));
    }

    #[tokio::test]
    async fn credentials_are_kept_per_provider() {
        let service = service();
        service
            .set_credential(ProviderKind::Gemini, " gemini-key ")
            .await
            .unwrap();
        service
            .set_credential(ProviderKind::Groq, "groq-key")
            .await
            .unwrap();

        service.forget_credential(ProviderKind::Groq).await.unwrap();
        assert_eq!(
            service.kv.get(keys::credential_key(ProviderKind::Gemini)).await.unwrap().as_deref(),
            Some("gemini-key")
        );
        assert_eq!(
            service.kv.get(keys::credential_key(ProviderKind::Groq)).await.unwrap(),
            None
        );

        let config = service
            .provider_config(ProviderKind::Gemini)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(config.api_key, "gemini-key");
        assert_eq!(config.model, "gemini-2.5-flash");
    }
}
