use serde::{Deserialize, Serialize};

use crate::model::question::Question;

/// Pseudo-theme that stands for "no filter".
pub const ALL_THEMES: &str = "All";

/// Set of themes that defines the active question subset.
///
/// Empty means every theme. Themes keep their insertion order and are
/// never duplicated; selecting [`ALL_THEMES`] clears the filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ThemeFilter {
    themes: Vec<String>,
}

impl ThemeFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_themes<I, S>(themes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for theme in themes {
            let theme = theme.as_ref().trim();
            if theme == ALL_THEMES {
                return Self::default();
            }
            if !theme.is_empty() && !filter.contains(theme) {
                filter.themes.push(theme.to_string());
            }
        }
        filter
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        self.themes.is_empty()
    }

    #[must_use]
    pub fn themes(&self) -> &[String] {
        &self.themes
    }

    #[must_use]
    pub fn contains(&self, theme: &str) -> bool {
        self.themes.iter().any(|t| t == theme)
    }

    /// Add the theme if absent, remove it if present. [`ALL_THEMES`] clears the filter.
    pub fn toggle(&mut self, theme: &str) {
        let theme = theme.trim();
        if theme == ALL_THEMES {
            self.themes.clear();
        } else if let Some(pos) = self.themes.iter().position(|t| t == theme) {
            self.themes.remove(pos);
        } else if !theme.is_empty() {
            self.themes.push(theme.to_string());
        }
    }

    #[must_use]
    pub fn matches(&self, theme: &str) -> bool {
        self.is_all() || self.contains(theme)
    }

    /// Questions accepted by the filter, in their original order.
    #[must_use]
    pub fn apply<'a>(&self, questions: &'a [Question]) -> Vec<&'a Question> {
        questions.iter().filter(|q| self.matches(q.theme())).collect()
    }
}

impl From<Vec<String>> for ThemeFilter {
    fn from(themes: Vec<String>) -> Self {
        Self::from_themes(themes)
    }
}

impl From<ThemeFilter> for Vec<String> {
    fn from(filter: ThemeFilter) -> Self {
        filter.themes
    }
}

/// Distinct themes in first-seen order.
#[must_use]
pub fn distinct_themes(questions: &[Question]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for question in questions {
        if !out.iter().any(|t| t == question.theme()) {
            out.push(question.theme().to_string());
        }
    }
    out
}
