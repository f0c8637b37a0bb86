use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use exam_core::model::{
    Question, QuestionDraft, QuestionError, QuestionId, QuestionPatch, distinct_themes,
};
use storage::keys;
use storage::repository::{KeyValueStore, QuestionRepository, load_json, save_json};

use crate::builtin::builtin_questions;
use crate::error::QuestionServiceError;

/// How the question set was initialised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionSetMode {
    /// Seeded from the built-in questions; built-ins never seeded before are
    /// merged in on load.
    #[default]
    Default,
    /// Explicitly cleared; the saved set is used as is.
    Clean,
}

impl fmt::Display for QuestionSetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Clean => "clean",
        })
    }
}

/// Result of a bulk import: committed questions plus the rejected candidates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub added: Vec<Question>,
    /// Position in the input and the reason it failed validation.
    pub rejected: Vec<(usize, QuestionError)>,
}

/// Orchestrates the question store.
#[derive(Clone)]
pub struct QuestionService {
    questions: Arc<dyn QuestionRepository>,
    kv: Arc<dyn KeyValueStore>,
}

impl QuestionService {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self { questions, kv }
    }

    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` if the mode cannot be read.
    pub async fn mode(&self) -> Result<QuestionSetMode, QuestionServiceError> {
        Ok(load_json(self.kv.as_ref(), keys::QUESTION_SET_MODE)
            .await?
            .unwrap_or_default())
    }

    /// Load the question set, merging in built-in questions that were never
    /// seeded unless the set was explicitly cleared. A built-in the user
    /// deleted stays deleted.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError` on storage failures.
    pub async fn load_or_seed(&self) -> Result<Vec<Question>, QuestionServiceError> {
        let mode = self.mode().await?;
        if mode == QuestionSetMode::Clean {
            return Ok(self.questions.list_questions().await?);
        }

        let existing: HashSet<QuestionId> = self
            .questions
            .list_questions()
            .await?
            .iter()
            .map(Question::id)
            .collect();
        let mut seeded = self.seeded_builtins().await?;
        let before = seeded.len();
        let missing: Vec<Question> = builtin_questions()?
            .into_iter()
            .filter(|question| seeded.insert(question.id()))
            .filter(|question| !existing.contains(&question.id()))
            .collect();
        for question in &missing {
            self.questions.upsert_question(question).await?;
        }
        if seeded.len() != before {
            save_json(self.kv.as_ref(), keys::SEEDED_BUILTINS, &seeded).await?;
        }
        if !missing.is_empty() {
            tracing::info!(added = missing.len(), "seeded built-in questions");
        }
        Ok(self.questions.list_questions().await?)
    }

    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` on storage failures.
    pub async fn list(&self) -> Result<Vec<Question>, QuestionServiceError> {
        Ok(self.questions.list_questions().await?)
    }

    /// Distinct themes in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` on storage failures.
    pub async fn themes(&self) -> Result<Vec<String>, QuestionServiceError> {
        Ok(distinct_themes(&self.questions.list_questions().await?))
    }

    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` (`NotFound`) for unknown ids.
    pub async fn get(&self, id: QuestionId) -> Result<Question, QuestionServiceError> {
        Ok(self.questions.get_question(id).await?)
    }

    /// Validate and commit one question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Question` if validation fails.
    pub async fn add(&self, draft: QuestionDraft) -> Result<Question, QuestionServiceError> {
        let validated = draft.validate()?;
        let id = self.questions.insert_question(&validated).await?;
        tracing::info!(id = %id, theme = validated.theme(), "question added");
        Ok(validated.assign_id(id))
    }

    /// Commit reviewed candidates. Invalid ones are reported, not fatal.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` if the batch cannot be written.
    pub async fn add_many(
        &self,
        drafts: Vec<QuestionDraft>,
    ) -> Result<ImportOutcome, QuestionServiceError> {
        let mut valid = Vec::with_capacity(drafts.len());
        let mut rejected = Vec::new();
        for (index, draft) in drafts.into_iter().enumerate() {
            match draft.validate() {
                Ok(question) => valid.push(question),
                Err(err) => rejected.push((index, err)),
            }
        }

        let ids = self.questions.insert_questions(&valid).await?;
        let added: Vec<Question> = valid
            .into_iter()
            .zip(ids)
            .map(|(question, id)| question.assign_id(id))
            .collect();
        tracing::info!(
            added = added.len(),
            rejected = rejected.len(),
            "questions imported"
        );
        Ok(ImportOutcome { added, rejected })
    }

    /// Apply a partial edit.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError` if the question is missing or the edit
    /// fails validation.
    pub async fn update(
        &self,
        id: QuestionId,
        patch: QuestionPatch,
    ) -> Result<Question, QuestionServiceError> {
        let current = self.questions.get_question(id).await?;
        if patch.is_empty() {
            return Ok(current);
        }
        let updated = current.with_patch(patch)?;
        self.questions.upsert_question(&updated).await?;
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` (`NotFound`) for unknown ids.
    pub async fn delete(&self, id: QuestionId) -> Result<(), QuestionServiceError> {
        self.questions.delete_question(id).await?;
        Ok(())
    }

    /// Remove every question and stop merging built-ins.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` on storage failures.
    pub async fn clear(&self) -> Result<(), QuestionServiceError> {
        self.questions.clear_questions().await?;
        self.set_mode(QuestionSetMode::Clean).await?;
        tracing::info!("question set cleared");
        Ok(())
    }

    /// Replace the set with the built-in questions.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` on storage failures.
    pub async fn reset_to_default(&self) -> Result<Vec<Question>, QuestionServiceError> {
        self.questions.clear_questions().await?;
        let builtin = builtin_questions()?;
        for question in &builtin {
            self.questions.upsert_question(question).await?;
        }
        let seeded: BTreeSet<QuestionId> = builtin.iter().map(Question::id).collect();
        save_json(self.kv.as_ref(), keys::SEEDED_BUILTINS, &seeded).await?;
        self.set_mode(QuestionSetMode::Default).await?;
        tracing::info!(questions = builtin.len(), "question set reset to defaults");
        Ok(builtin)
    }

    async fn seeded_builtins(&self) -> Result<BTreeSet<QuestionId>, QuestionServiceError> {
        Ok(load_json(self.kv.as_ref(), keys::SEEDED_BUILTINS)
            .await?
            .unwrap_or_default())
    }

    async fn set_mode(&self, mode: QuestionSetMode) -> Result<(), QuestionServiceError> {
        save_json(self.kv.as_ref(), keys::QUESTION_SET_MODE, &mode).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::{InMemoryRepository, StorageError};

    fn service() -> QuestionService {
        let repo = Arc::new(InMemoryRepository::new());
        QuestionService::new(repo.clone(), repo)
    }

    fn draft(prompt: &str) -> QuestionDraft {
        QuestionDraft::new("Networks", prompt)
            .with_options(["a", "b", "c", "d"])
            .with_answer(3)
    }

    #[tokio::test]
    async fn first_load_seeds_builtin_questions() {
        let service = service();
        let loaded = service.load_or_seed().await.unwrap();
        assert_eq!(loaded, builtin_questions().unwrap());
        assert_eq!(service.mode().await.unwrap(), QuestionSetMode::Default);

        // second load adds nothing
        assert_eq!(service.load_or_seed().await.unwrap().len(), loaded.len());
    }

    #[tokio::test]
    async fn cleared_set_stays_empty() {
        let service = service();
        service.load_or_seed().await.unwrap();
        service.clear().await.unwrap();

        assert!(service.load_or_seed().await.unwrap().is_empty());
        assert_eq!(service.mode().await.unwrap(), QuestionSetMode::Clean);

        let reset = service.reset_to_default().await.unwrap();
        assert_eq!(service.list().await.unwrap(), reset);
        assert_eq!(service.mode().await.unwrap(), QuestionSetMode::Default);
    }

    #[tokio::test]
    async fn deleted_builtin_is_not_seeded_again() {
        let service = service();
        let seeded = service.load_or_seed().await.unwrap();
        service.delete(QuestionId::new(2)).await.unwrap();

        let reloaded = service.load_or_seed().await.unwrap();
        assert_eq!(reloaded.len(), seeded.len() - 1);
        assert!(reloaded.iter().all(|q| q.id() != QuestionId::new(2)));

        // reset brings every built-in back
        service.reset_to_default().await.unwrap();
        service.delete(QuestionId::new(2)).await.unwrap();
        assert_eq!(service.load_or_seed().await.unwrap().len(), seeded.len() - 1);
    }

    #[tokio::test]
    async fn builtins_never_seeded_are_merged_in() {
        let service = service();
        let partial: BTreeSet<QuestionId> = [1, 2, 3].into_iter().map(QuestionId::new).collect();
        save_json(service.kv.as_ref(), keys::SEEDED_BUILTINS, &partial)
            .await
            .unwrap();

        let loaded = service.load_or_seed().await.unwrap();
        let ids: Vec<_> = loaded.iter().map(Question::id).collect();
        assert_eq!(ids, (4..=6).map(QuestionId::new).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn added_questions_get_fresh_ids_after_builtins() {
        let service = service();
        let builtin = service.load_or_seed().await.unwrap();
        let added = service.add(draft("Custom?")).await.unwrap();
        assert!(builtin.iter().all(|q| q.id() < added.id()));
    }

    #[tokio::test]
    async fn add_many_reports_invalid_candidates() {
        let service = service();
        let mut broken = draft("Broken");
        broken.answer = 7;
        let outcome = service
            .add_many(vec![draft("One"), broken, draft("Two")])
            .await
            .unwrap();

        assert_eq!(outcome.added.len(), 2);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].0, 1);
        assert_eq!(service.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_applies_only_supplied_fields() {
        let service = service();
        let question = service.add(draft("Before")).await.unwrap();

        let updated = service
            .update(
                question.id(),
                QuestionPatch {
                    question: Some("After".into()),
                    ..QuestionPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.prompt(), "After");
        assert_eq!(updated.answer(), 3);
        assert_eq!(service.get(question.id()).await.unwrap(), updated);

        let rejected = service
            .update(
                question.id(),
                QuestionPatch {
                    answer: Some(9),
                    ..QuestionPatch::default()
                },
            )
            .await;
        assert!(matches!(rejected, Err(QuestionServiceError::Question(_))));
    }

    #[tokio::test]
    async fn themes_and_delete() {
        let service = service();
        service.load_or_seed().await.unwrap();
        let themes = service.themes().await.unwrap();
        assert_eq!(themes[0], "Computer Networks");
        assert_eq!(themes.len(), 4);

        service.delete(QuestionId::new(1)).await.unwrap();
        assert!(matches!(
            service.delete(QuestionId::new(1)).await,
            Err(QuestionServiceError::Storage(StorageError::NotFound))
        ));
    }
}
