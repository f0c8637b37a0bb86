use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Remote text-generation service used for extraction and explanations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    #[default]
    Groq,
}

impl ProviderKind {
    pub const ALL: [Self; 2] = [Self::Gemini, Self::Groq];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Groq => "groq",
        }
    }

    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => DEFAULT_GEMINI_MODEL,
            Self::Groq => DEFAULT_GROQ_MODEL,
        }
    }

    /// Whether the provider can read page images directly.
    #[must_use]
    pub fn supports_images(self) -> bool {
        matches!(self, Self::Gemini)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppSettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            other => Err(AppSettingsError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    #[default]
    Light,
    Dark,
}

impl FromStr for Appearance {
    type Err = AppSettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(AppSettingsError::UnknownAppearance(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppSettings {
    provider: ProviderKind,
    gemini_model: String,
    groq_model: String,
    appearance: Appearance,
}

/// Persisted, unvalidated form of [`AppSettings`].
///
/// Every field is optional so that settings written by older builds still load.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettingsDraft {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub gemini_model: Option<String>,
    #[serde(default)]
    pub groq_model: Option<String>,
    #[serde(default)]
    pub appearance: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AppSettingsError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("unknown appearance: {0}")]
    UnknownAppearance(String),
}

impl AppSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalize the draft into settings.
    ///
    /// Blank values fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsError` if the provider or appearance is not recognised.
    pub fn validate(self) -> Result<AppSettings, AppSettingsError> {
        let provider = normalize_optional(self.provider)
            .map(|raw| raw.parse())
            .transpose()?
            .unwrap_or_default();
        let appearance = normalize_optional(self.appearance)
            .map(|raw| raw.parse())
            .transpose()?
            .unwrap_or_default();

        Ok(AppSettings {
            provider,
            gemini_model: normalize_optional(self.gemini_model)
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            groq_model: normalize_optional(self.groq_model)
                .unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
            appearance,
        })
    }
}

impl AppSettings {
    #[must_use]
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    #[must_use]
    pub fn appearance(&self) -> Appearance {
        self.appearance
    }

    /// Model configured for the given provider.
    #[must_use]
    pub fn model_for(&self, provider: ProviderKind) -> &str {
        match provider {
            ProviderKind::Gemini => &self.gemini_model,
            ProviderKind::Groq => &self.groq_model,
        }
    }

    /// Model of the preferred provider.
    #[must_use]
    pub fn active_model(&self) -> &str {
        self.model_for(self.provider)
    }

    #[must_use]
    pub fn to_draft(&self) -> AppSettingsDraft {
        AppSettingsDraft {
            provider: Some(self.provider.as_str().to_string()),
            gemini_model: Some(self.gemini_model.clone()),
            groq_model: Some(self.groq_model.clone()),
            appearance: Some(
                match self.appearance {
                    Appearance::Light => "light",
                    Appearance::Dark => "dark",
                }
                .to_string(),
            ),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            groq_model: DEFAULT_GROQ_MODEL.to_string(),
            appearance: Appearance::default(),
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_draft_yields_defaults() {
        let settings = AppSettingsDraft::new().validate().unwrap();
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.provider(), ProviderKind::Groq);
        assert_eq!(settings.active_model(), DEFAULT_GROQ_MODEL);
    }

    #[test]
    fn blank_model_falls_back_and_provider_is_case_insensitive() {
        let settings = AppSettingsDraft {
            provider: Some(" Gemini ".into()),
            gemini_model: Some("  ".into()),
            groq_model: Some("mixtral".into()),
            appearance: Some("DARK".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(settings.provider(), ProviderKind::Gemini);
        assert_eq!(settings.active_model(), DEFAULT_GEMINI_MODEL);
        assert_eq!(settings.model_for(ProviderKind::Groq), "mixtral");
        assert_eq!(settings.appearance(), Appearance::Dark);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = AppSettingsDraft {
            provider: Some("openai".into()),
            ..AppSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, AppSettingsError::UnknownProvider("openai".into()));
    }

    #[test]
    fn draft_round_trips_through_json() {
        let settings = AppSettingsDraft {
            provider: Some("gemini".into()),
            ..AppSettingsDraft::default()
        }
        .validate()
        .unwrap();
        let json = serde_json::to_string(&settings.to_draft()).unwrap();
        let back: AppSettingsDraft = serde_json::from_str(&json).unwrap();
        assert_eq!(back.validate().unwrap(), settings);
    }
}
