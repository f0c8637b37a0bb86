use async_trait::async_trait;
use exam_core::model::{Question, QuestionId, ValidatedQuestion};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for the question bank.
///
/// Identifiers are assigned by the repository, increase monotonically and are
/// never reused, even after deletion or a full clear.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// All questions in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the questions cannot be loaded.
    async fn list_questions(&self) -> Result<Vec<Question>, StorageError>;

    /// Fetch a single question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError>;

    /// Commit a validated question and return its new id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn insert_question(&self, question: &ValidatedQuestion)
    -> Result<QuestionId, StorageError>;

    /// Commit several questions atomically, returning ids in input order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any question cannot be stored; nothing is committed then.
    async fn insert_questions(
        &self,
        questions: &[ValidatedQuestion],
    ) -> Result<Vec<QuestionId>, StorageError>;

    /// Persist a question under its existing id, replacing any stored version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Remove a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the id is unknown.
    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError>;

    /// Remove every question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be cleared.
    async fn clear_questions(&self) -> Result<(), StorageError>;
}

/// String key-value persistence for preferences and session state.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a JSON value.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the stored text is not valid for `T`.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Serialization(format!("{key}: {e}"))),
        None => Ok(None),
    }
}

/// Encode a value as JSON and store it.
///
/// # Errors
///
/// Returns `StorageError` if encoding or writing fails.
pub async fn save_json<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw =
        serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
    store.set(key, &raw).await
}

#[derive(Default)]
struct QuestionTable {
    rows: BTreeMap<QuestionId, Question>,
    next_id: u64,
}

impl QuestionTable {
    fn allocate(&mut self) -> QuestionId {
        self.next_id = self.next_id.max(1);
        let id = QuestionId::new(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<QuestionTable>>,
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard.rows.values().cloned().collect())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        guard.rows.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn insert_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        let id = guard.allocate();
        guard.rows.insert(id, question.clone().assign_id(id));
        Ok(id)
    }

    async fn insert_questions(
        &self,
        questions: &[ValidatedQuestion],
    ) -> Result<Vec<QuestionId>, StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        let mut ids = Vec::with_capacity(questions.len());
        for question in questions {
            let id = guard.allocate();
            guard.rows.insert(id, question.clone().assign_id(id));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        let id = question.id();
        guard.next_id = guard.next_id.max(id.value() + 1);
        guard.rows.insert(id, question.clone());
        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn clear_questions(&self) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.rows.clear();
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self.values.lock().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.values.lock().map_err(poisoned)?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self.values.lock().map_err(poisoned)?;
        guard.remove(key);
        Ok(())
    }
}

/// Aggregates the question bank and key-value store behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub kv: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let kv: Arc<dyn KeyValueStore> = Arc::new(repo);
        Self { questions, kv }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::QuestionDraft;

    fn validated(prompt: &str) -> ValidatedQuestion {
        QuestionDraft::new("Networks", prompt)
            .with_options(["a", "b", "c", "d"])
            .validate()
            .unwrap()
    }

    #[tokio::test]
    async fn ids_are_monotonic_and_never_reused() {
        let repo = InMemoryRepository::new();
        let first = repo.insert_question(&validated("Q1")).await.unwrap();
        let second = repo.insert_question(&validated("Q2")).await.unwrap();
        assert!(second > first);

        repo.delete_question(second).await.unwrap();
        repo.clear_questions().await.unwrap();
        let third = repo.insert_question(&validated("Q3")).await.unwrap();
        assert!(third > second);
    }

    #[tokio::test]
    async fn upsert_with_explicit_id_advances_allocator() {
        let repo = InMemoryRepository::new();
        let seeded = validated("Seed").assign_id(QuestionId::new(10));
        repo.upsert_question(&seeded).await.unwrap();

        let ids = repo
            .insert_questions(&[validated("A"), validated("B")])
            .await
            .unwrap();
        assert_eq!(ids, vec![QuestionId::new(11), QuestionId::new(12)]);

        let listed: Vec<_> = repo
            .list_questions()
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.id().value())
            .collect();
        assert_eq!(listed, vec![10, 11, 12]);
    }

    #[tokio::test]
    async fn missing_question_is_not_found() {
        let repo = InMemoryRepository::new();
        assert!(matches!(
            repo.get_question(QuestionId::new(1)).await,
            Err(StorageError::NotFound)
        ));
        assert!(matches!(
            repo.delete_question(QuestionId::new(1)).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn json_helpers_round_trip_and_flag_corruption() {
        let storage = Storage::in_memory();
        save_json(storage.kv.as_ref(), "numbers", &vec![1, 2, 3])
            .await
            .unwrap();
        let loaded: Option<Vec<u32>> = load_json(storage.kv.as_ref(), "numbers").await.unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));

        storage.kv.set("numbers", "{not json").await.unwrap();
        let err = load_json::<Vec<u32>>(storage.kv.as_ref(), "numbers")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));

        storage.kv.remove("numbers").await.unwrap();
        let missing: Option<Vec<u32>> = load_json(storage.kv.as_ref(), "numbers").await.unwrap();
        assert!(missing.is_none());
    }
}
