use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::QuestionId;

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;

/// Theme used when a question arrives without one.
pub const DEFAULT_THEME: &str = "General";

/// Filler text for options that could not be recovered from the source.
pub const MISSING_OPTION: &str = "Option missing";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyPrompt,

    #[error("expected {expected} options, found {found}")]
    OptionCount { expected: usize, found: usize },

    #[error("answer index {answer} is out of range for {len} options")]
    AnswerOutOfRange { answer: usize, len: usize },

    #[error("invalid image url: {0}")]
    InvalidImageUrl(String),
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated question fields.
///
/// Drafts come from the editor or from the extraction pipeline (where they are
/// the candidate questions awaiting review). They carry no identifier; one is
/// assigned only when the validated question is committed to the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub theme: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_answer")]
    pub answer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_description: Option<String>,
}

impl QuestionDraft {
    #[must_use]
    pub fn new(theme: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            question: question.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_answer(mut self, answer: usize) -> Self {
        self.answer = answer;
        self
    }

    /// Fill missing options with [`MISSING_OPTION`] until four are present.
    pub fn pad_options(&mut self) {
        while self.options.len() < OPTION_COUNT {
            self.options.push(MISSING_OPTION.to_string());
        }
    }

    /// Validate and normalize the draft.
    ///
    /// Blank themes fall back to [`DEFAULT_THEME`]; text fields are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is empty, the option count is not
    /// exactly four, the answer index is out of range, or the image url is invalid.
    pub fn validate(self) -> Result<ValidatedQuestion, QuestionError> {
        let prompt = self.question.trim().to_string();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }

        let theme = match self.theme.trim() {
            "" => DEFAULT_THEME.to_string(),
            theme => theme.to_string(),
        };

        let found = self.options.len();
        let options: [String; OPTION_COUNT] = self
            .options
            .into_iter()
            .map(|option| option.trim().to_string())
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| QuestionError::OptionCount {
                expected: OPTION_COUNT,
                found,
            })?;

        if self.answer >= OPTION_COUNT {
            return Err(QuestionError::AnswerOutOfRange {
                answer: self.answer,
                len: OPTION_COUNT,
            });
        }

        let image = normalize_optional(self.image)
            .map(|raw| Url::parse(&raw).map_err(|_| QuestionError::InvalidImageUrl(raw)))
            .transpose()?;

        Ok(ValidatedQuestion {
            theme,
            prompt,
            options,
            answer: self.answer,
            image,
            image_description: normalize_optional(self.image_description),
        })
    }
}

/// Partial edit applied to an existing question.
///
/// `None` leaves a field untouched; for the optional fields `Some(None)` clears them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuestionPatch {
    pub theme: Option<String>,
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub answer: Option<usize>,
    pub image: Option<Option<String>>,
    pub image_description: Option<Option<String>>,
}

impl QuestionPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

//
// ─── VALIDATED QUESTION ────────────────────────────────────────────────────────
//

/// Question content that passed validation but has no identifier yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedQuestion {
    theme: String,
    prompt: String,
    options: [String; OPTION_COUNT],
    answer: usize,
    image: Option<Url>,
    image_description: Option<String>,
}

impl ValidatedQuestion {
    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question { id, content: self }
    }

    #[must_use]
    pub fn theme(&self) -> &str {
        &self.theme
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    #[must_use]
    pub fn answer(&self) -> usize {
        self.answer
    }

    #[must_use]
    pub fn image(&self) -> Option<&Url> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn image_description(&self) -> Option<&str> {
        self.image_description.as_deref()
    }

    #[must_use]
    pub fn to_draft(&self) -> QuestionDraft {
        QuestionDraft {
            theme: self.theme.clone(),
            question: self.prompt.clone(),
            options: self.options.to_vec(),
            answer: self.answer,
            image: self.image.as_ref().map(ToString::to_string),
            image_description: self.image_description.clone(),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A committed multiple-choice question owned by the question store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    content: ValidatedQuestion,
}

impl Question {
    /// Validate a draft and attach an identifier, typically when rehydrating.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the draft fails validation.
    pub fn from_draft(id: QuestionId, draft: QuestionDraft) -> Result<Self, QuestionError> {
        Ok(draft.validate()?.assign_id(id))
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn content(&self) -> &ValidatedQuestion {
        &self.content
    }

    #[must_use]
    pub fn theme(&self) -> &str {
        self.content.theme()
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        self.content.prompt()
    }

    #[must_use]
    pub fn options(&self) -> &[String; OPTION_COUNT] {
        self.content.options()
    }

    /// Index of the correct option.
    #[must_use]
    pub fn answer(&self) -> usize {
        self.content.answer()
    }

    #[must_use]
    pub fn image(&self) -> Option<&Url> {
        self.content.image()
    }

    #[must_use]
    pub fn image_description(&self) -> Option<&str> {
        self.content.image_description()
    }

    #[must_use]
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.answer()
    }

    #[must_use]
    pub fn to_draft(&self) -> QuestionDraft {
        self.content.to_draft()
    }

    /// Apply a partial edit, keeping the identifier.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the edited question fails validation.
    pub fn with_patch(&self, patch: QuestionPatch) -> Result<Self, QuestionError> {
        let mut draft = self.to_draft();
        if let Some(theme) = patch.theme {
            draft.theme = theme;
        }
        if let Some(question) = patch.question {
            draft.question = question;
        }
        if let Some(options) = patch.options {
            draft.options = options;
        }
        if let Some(answer) = patch.answer {
            draft.answer = answer;
        }
        if let Some(image) = patch.image {
            draft.image = image;
        }
        if let Some(description) = patch.image_description {
            draft.image_description = description;
        }
        Self::from_draft(self.id, draft)
    }
}

//
// ─── LABELS ────────────────────────────────────────────────────────────────────
//

/// Letter shown next to an option (`0 -> 'A'`).
#[must_use]
pub fn option_label(index: usize) -> char {
    u32::try_from(index)
        .ok()
        .and_then(|offset| char::from_u32(u32::from(b'A') + offset))
        .filter(char::is_ascii_uppercase)
        .unwrap_or('?')
}

/// Parse an answer given either as an index (`"2"`) or a letter (`"C"`, `"c)"`).
#[must_use]
pub fn answer_from_label(label: &str) -> Option<usize> {
    let trimmed = label.trim();
    if let Ok(index) = trimmed.parse::<usize>() {
        return Some(index);
    }
    let mut chars = trimmed.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !chars.all(|c| matches!(c, '.' | ')' | ':')) {
        return None;
    }
    match letter {
        'A'..='Z' => Some(usize::from(letter as u8 - b'A')),
        _ => None,
    }
}

fn deserialize_answer<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAnswer {
        Index(usize),
        Label(String),
    }

    match RawAnswer::deserialize(deserializer)? {
        RawAnswer::Index(index) => Ok(index),
        RawAnswer::Label(label) => answer_from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognised answer: {label}"))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> QuestionDraft {
        QuestionDraft::new("Networks", "Which layer routes packets?")
            .with_options(["Physical", "Network", "Transport", "Session"])
            .with_answer(1)
    }

    #[test]
    fn validate_trims_and_defaults_theme() {
        let mut d = draft();
        d.theme = "   ".into();
        d.question = "  Which layer routes packets?  ".into();
        let q = d.validate().unwrap().assign_id(QuestionId::new(3));
        assert_eq!(q.theme(), DEFAULT_THEME);
        assert_eq!(q.prompt(), "Which layer routes packets?");
        assert_eq!(q.answer(), 1);
        assert!(q.is_correct(1));
    }

    #[test]
    fn validate_rejects_wrong_option_count() {
        let d = draft().with_options(["a", "b", "c"]);
        assert_eq!(
            d.validate().unwrap_err(),
            QuestionError::OptionCount {
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn validate_rejects_out_of_range_answer() {
        let err = draft().with_answer(4).validate().unwrap_err();
        assert!(matches!(err, QuestionError::AnswerOutOfRange { answer: 4, .. }));
    }

    #[test]
    fn validate_rejects_blank_prompt_and_bad_image() {
        let mut d = draft();
        d.question = " ".into();
        assert_eq!(d.validate().unwrap_err(), QuestionError::EmptyPrompt);

        let mut d = draft();
        d.image = Some("not a url".into());
        assert!(matches!(
            d.validate().unwrap_err(),
            QuestionError::InvalidImageUrl(_)
        ));
    }

    #[test]
    fn pad_options_fills_placeholders() {
        let mut d = draft().with_options(["only one"]);
        d.pad_options();
        assert_eq!(d.options.len(), OPTION_COUNT);
        assert_eq!(d.options[3], MISSING_OPTION);
    }

    #[test]
    fn patch_updates_selected_fields_only() {
        let q = Question::from_draft(QuestionId::new(1), draft()).unwrap();
        let edited = q
            .with_patch(QuestionPatch {
                answer: Some(2),
                image_description: Some(Some("OSI diagram".into())),
                ..QuestionPatch::default()
            })
            .unwrap();
        assert_eq!(edited.id(), q.id());
        assert_eq!(edited.prompt(), q.prompt());
        assert_eq!(edited.answer(), 2);
        assert_eq!(edited.image_description(), Some("OSI diagram"));

        let err = q
            .with_patch(QuestionPatch {
                answer: Some(9),
                ..QuestionPatch::default()
            })
            .unwrap_err();
        assert!(matches!(err, QuestionError::AnswerOutOfRange { .. }));
    }

    #[test]
    fn draft_deserializes_letter_answers_and_null_theme() {
        let json = r#"{"theme":null,"question":"Q","options":["a","b","c","d"],"answer":"C","imageDescription":"graph"}"#;
        let d: QuestionDraft = serde_json::from_str(json).unwrap();
        assert_eq!(d.theme, "");
        assert_eq!(d.answer, 2);
        assert_eq!(d.image_description.as_deref(), Some("graph"));
    }

    #[test]
    fn labels_round_trip() {
        assert_eq!(option_label(0), 'A');
        assert_eq!(option_label(3), 'D');
        assert_eq!(answer_from_label("b)"), Some(1));
        assert_eq!(answer_from_label("3"), Some(3));
        assert_eq!(answer_from_label("banana"), None);
    }
}
