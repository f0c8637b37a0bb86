use exam_core::model::{Question, QuestionDraft, QuestionId, ValidatedQuestion};
use sqlx::Row;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    u64::try_from(v)
        .map(QuestionId::new)
        .map_err(|_| StorageError::Serialization("question_id sign overflow".into()))
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("question_id overflow".into()))
}

/// Column values for a question row, without the id.
pub(crate) struct QuestionColumns {
    pub theme: String,
    pub prompt: String,
    pub options: String,
    pub answer: i64,
    pub image: Option<String>,
    pub image_description: Option<String>,
}

impl QuestionColumns {
    pub(crate) fn from_validated(question: &ValidatedQuestion) -> Result<Self, StorageError> {
        Ok(Self {
            theme: question.theme().to_string(),
            prompt: question.prompt().to_string(),
            options: serde_json::to_string(question.options()).map_err(ser)?,
            answer: i64::try_from(question.answer()).map_err(ser)?,
            image: question.image().map(ToString::to_string),
            image_description: question.image_description().map(ToString::to_string),
        })
    }
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = question_id_from_i64(row.try_get("id").map_err(ser)?)?;
    let options_json: String = row.try_get("options").map_err(ser)?;
    let options: Vec<String> = serde_json::from_str(&options_json).map_err(ser)?;
    let answer_i64: i64 = row.try_get("answer").map_err(ser)?;
    let answer = usize::try_from(answer_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid answer: {answer_i64}")))?;

    let draft = QuestionDraft {
        theme: row.try_get("theme").map_err(ser)?,
        question: row.try_get("prompt").map_err(ser)?,
        options,
        answer,
        image: row.try_get("image").map_err(ser)?,
        image_description: row.try_get("image_description").map_err(ser)?,
    };

    Question::from_draft(id, draft).map_err(ser)
}
