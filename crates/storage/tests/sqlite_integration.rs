use exam_core::model::{QuestionDraft, QuestionId, ValidatedQuestion};
use storage::keys;
use storage::repository::{KeyValueStore, QuestionRepository, StorageError};
use storage::sqlite::SqliteRepository;

fn validated(theme: &str, prompt: &str, answer: usize) -> ValidatedQuestion {
    QuestionDraft::new(theme, prompt)
        .with_options(["Alpha", "Beta", "Gamma", "Delta"])
        .with_answer(answer)
        .validate()
        .unwrap()
}

async fn repo(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::in_memory(name).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_question_fields() {
    let repo = repo("memdb_question_roundtrip").await;

    let mut draft = QuestionDraft::new("Databases", "Which normal form removes partial dependencies?")
        .with_options(["1NF", "2NF", "3NF", "BCNF"])
        .with_answer(1);
    draft.image = Some("https://example.org/erd.png".into());
    draft.image_description = Some("ER diagram".into());
    let id = repo
        .insert_question(&draft.validate().unwrap())
        .await
        .unwrap();

    let fetched = repo.get_question(id).await.unwrap();
    assert_eq!(fetched.theme(), "Databases");
    assert_eq!(fetched.options()[3], "BCNF");
    assert_eq!(fetched.answer(), 1);
    assert_eq!(
        fetched.image().map(ToString::to_string).as_deref(),
        Some("https://example.org/erd.png")
    );
    assert_eq!(fetched.image_description(), Some("ER diagram"));
}

#[tokio::test]
async fn sqlite_ids_are_never_reused() {
    let repo = repo("memdb_question_ids").await;

    let seeded = validated("General", "Seed", 0).assign_id(QuestionId::new(5));
    repo.upsert_question(&seeded).await.unwrap();

    let ids = repo
        .insert_questions(&[validated("T", "A", 0), validated("T", "B", 2)])
        .await
        .unwrap();
    assert_eq!(ids, vec![QuestionId::new(6), QuestionId::new(7)]);

    repo.delete_question(ids[1]).await.unwrap();
    repo.clear_questions().await.unwrap();
    assert!(repo.list_questions().await.unwrap().is_empty());

    let next = repo.insert_question(&validated("T", "C", 3)).await.unwrap();
    assert!(next > ids[1]);

    assert!(matches!(
        repo.delete_question(ids[0]).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_upsert_replaces_existing_question() {
    let repo = repo("memdb_question_upsert").await;

    let id = repo
        .insert_question(&validated("Networks", "Old prompt", 0))
        .await
        .unwrap();
    let updated = validated("Security", "New prompt", 3).assign_id(id);
    repo.upsert_question(&updated).await.unwrap();

    let listed = repo.list_questions().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], updated);
}

#[tokio::test]
async fn sqlite_key_value_store_overwrites_and_removes() {
    let repo = repo("memdb_kv_store").await;

    assert_eq!(repo.get(keys::PRACTICE_STATE).await.unwrap(), None);
    repo.set(keys::PRACTICE_STATE, "{\"currentIndex\":1}")
        .await
        .unwrap();
    repo.set(keys::PRACTICE_STATE, "{\"currentIndex\":2}")
        .await
        .unwrap();
    assert_eq!(
        repo.get(keys::PRACTICE_STATE).await.unwrap().as_deref(),
        Some("{\"currentIndex\":2}")
    );

    repo.remove(keys::PRACTICE_STATE).await.unwrap();
    repo.remove(keys::PRACTICE_STATE).await.unwrap();
    assert_eq!(repo.get(keys::PRACTICE_STATE).await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_file_database_is_created_and_reopened() {
    let path = std::env::temp_dir().join(format!("exam-questions-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let url = format!("sqlite:{}", path.display());

    let repo = SqliteRepository::connect(&url).await.expect("create");
    repo.migrate().await.expect("migrate");
    let id = repo
        .insert_question(&validated("Operating Systems", "Which call creates a process?", 2))
        .await
        .unwrap();
    repo.pool().close().await;
    assert!(path.exists());

    let reopened = SqliteRepository::connect(&url).await.expect("reopen");
    reopened.migrate().await.expect("migrations are idempotent");
    assert_eq!(reopened.get_question(id).await.unwrap().answer(), 2);
    reopened.pool().close().await;
    let _ = std::fs::remove_file(&path);
}
