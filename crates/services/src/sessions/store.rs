use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;

use exam_core::model::{AnswerMap, AttemptRecord, FlagSet, PracticeSnapshot};
use storage::keys;
use storage::repository::{KeyValueStore, StorageError, load_json, save_json};

#[derive(Debug, Default)]
struct Health {
    memory_only: bool,
    diagnostic: Option<String>,
}

/// Session persistence that never fails the caller.
///
/// Unreadable or corrupt values load as defaults. The first failed write
/// switches the store to memory-only operation: later writes are skipped and
/// a diagnostic is kept for the UI.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    health: Arc<Mutex<Health>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            health: Arc::new(Mutex::new(Health::default())),
        }
    }

    /// True once a write failed and persistence was abandoned.
    #[must_use]
    pub fn is_memory_only(&self) -> bool {
        self.health.lock().map(|h| h.memory_only).unwrap_or(true)
    }

    /// Last non-fatal persistence problem, if any.
    #[must_use]
    pub fn diagnostic(&self) -> Option<String> {
        self.health.lock().ok().and_then(|h| h.diagnostic.clone())
    }

    pub async fn load_practice(&self) -> Option<PracticeSnapshot> {
        self.read(keys::PRACTICE_STATE).await
    }

    pub async fn save_practice(&self, snapshot: &PracticeSnapshot) {
        self.write(keys::PRACTICE_STATE, snapshot).await;
    }

    pub async fn clear_practice(&self) {
        if self.is_memory_only() {
            return;
        }
        if let Err(err) = self.kv.remove(keys::PRACTICE_STATE).await {
            self.degrade(keys::PRACTICE_STATE, &err);
        }
    }

    /// Durable answers and flags shared by every attempt.
    pub async fn load_answer_book(&self) -> (AnswerMap, FlagSet) {
        let answers = self.read(keys::USER_ANSWERS).await.unwrap_or_default();
        let flagged = self.read(keys::FLAGGED).await.unwrap_or_default();
        (answers, flagged)
    }

    pub async fn save_answer_book(&self, answers: &AnswerMap, flagged: &FlagSet) {
        self.write(keys::USER_ANSWERS, answers).await;
        self.write(keys::FLAGGED, flagged).await;
    }

    /// Completed attempts, oldest first.
    pub async fn load_history(&self) -> Vec<AttemptRecord> {
        self.read(keys::EXAM_HISTORY).await.unwrap_or_default()
    }

    pub async fn append_history(&self, record: AttemptRecord) {
        let mut history = self.load_history().await;
        history.push(record);
        self.write(keys::EXAM_HISTORY, &history).await;
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match load_json(self.kv.as_ref(), key).await {
            Ok(value) => value,
            Err(StorageError::Serialization(reason)) => {
                tracing::warn!(key, %reason, "ignoring corrupt persisted value");
                self.note(format!("discarded corrupt {key}"));
                None
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "persisted value unavailable");
                self.note(format!("could not read {key}: {err}"));
                None
            }
        }
    }

    async fn write<T: Serialize + Sync>(&self, key: &str, value: &T) {
        if self.is_memory_only() {
            return;
        }
        if let Err(err) = save_json(self.kv.as_ref(), key, value).await {
            self.degrade(key, &err);
        }
    }

    fn degrade(&self, key: &str, err: &StorageError) {
        tracing::warn!(key, error = %err, "persistence failed, continuing in memory only");
        if let Ok(mut health) = self.health.lock() {
            health.memory_only = true;
            health.diagnostic = Some(format!("progress is not being saved: {err}"));
        }
    }

    fn note(&self, message: String) {
        if let Ok(mut health) = self.health.lock() {
            health.diagnostic = Some(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use exam_core::model::{QuestionId, ThemeFilter};
    use storage::repository::InMemoryRepository;

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Connection("disk unavailable".into()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk unavailable".into()))
        }

        async fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk unavailable".into()))
        }
    }

    fn snapshot() -> PracticeSnapshot {
        let mut answers = AnswerMap::new();
        answers.insert(QuestionId::new(2), 1);
        PracticeSnapshot {
            current_index: 1,
            answers,
            selected_themes: ThemeFilter::from_themes(["Networks"]),
        }
    }

    #[tokio::test]
    async fn practice_snapshot_round_trips() {
        let store = SessionStore::new(Arc::new(InMemoryRepository::new()));
        assert!(store.load_practice().await.is_none());

        store.save_practice(&snapshot()).await;
        assert_eq!(store.load_practice().await, Some(snapshot()));

        store.clear_practice().await;
        assert!(store.load_practice().await.is_none());
        assert!(store.diagnostic().is_none());
    }

    #[tokio::test]
    async fn corrupt_values_fall_back_to_defaults() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.set(keys::PRACTICE_STATE, "{oops").await.unwrap();
        repo.set(keys::USER_ANSWERS, "[1,2").await.unwrap();

        let store = SessionStore::new(repo);
        assert!(store.load_practice().await.is_none());
        let (answers, flagged) = store.load_answer_book().await;
        assert!(answers.is_empty());
        assert!(flagged.is_empty());
        assert!(store.diagnostic().is_some());
        assert!(!store.is_memory_only());
    }

    #[tokio::test]
    async fn failed_writes_switch_to_memory_only() {
        let store = SessionStore::new(Arc::new(FailingStore));
        assert!(store.load_practice().await.is_none());
        assert!(!store.is_memory_only());

        store.save_practice(&snapshot()).await;
        assert!(store.is_memory_only());
        assert!(
            store
                .diagnostic()
                .is_some_and(|msg| msg.contains("not being saved"))
        );

        store.clear_practice().await;
        assert!(store.load_history().await.is_empty());
    }
}
