use async_trait::async_trait;
use chrono::Utc;
use exam_core::model::{Question, QuestionId, ValidatedQuestion};

use super::SqliteRepository;
use super::mapping::{QuestionColumns, map_question_row, question_id_from_i64, question_id_to_i64};
use crate::repository::{QuestionRepository, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

const INSERT_QUESTION: &str = r"
    INSERT INTO questions (theme, prompt, options, answer, image, image_description, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
";

#[async_trait]
impl QuestionRepository for SqliteRepository {
    async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, theme, prompt, options, answer, image, image_description
            FROM questions
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, theme, prompt, options, answer, image, image_description
            FROM questions
            WHERE id = ?1
            ",
        )
        .bind(question_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_question_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn insert_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        let cols = QuestionColumns::from_validated(question)?;
        let res = sqlx::query(INSERT_QUESTION)
            .bind(cols.theme)
            .bind(cols.prompt)
            .bind(cols.options)
            .bind(cols.answer)
            .bind(cols.image)
            .bind(cols.image_description)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        question_id_from_i64(res.last_insert_rowid())
    }

    async fn insert_questions(
        &self,
        questions: &[ValidatedQuestion],
    ) -> Result<Vec<QuestionId>, StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let mut ids = Vec::with_capacity(questions.len());

        for question in questions {
            let cols = QuestionColumns::from_validated(question)?;
            let res = sqlx::query(INSERT_QUESTION)
                .bind(cols.theme)
                .bind(cols.prompt)
                .bind(cols.options)
                .bind(cols.answer)
                .bind(cols.image)
                .bind(cols.image_description)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            ids.push(question_id_from_i64(res.last_insert_rowid())?);
        }

        tx.commit().await.map_err(conn)?;
        Ok(ids)
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let cols = QuestionColumns::from_validated(question.content())?;
        sqlx::query(
            r"
            INSERT INTO questions (id, theme, prompt, options, answer, image, image_description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                theme = excluded.theme,
                prompt = excluded.prompt,
                options = excluded.options,
                answer = excluded.answer,
                image = excluded.image,
                image_description = excluded.image_description
            ",
        )
        .bind(question_id_to_i64(question.id())?)
        .bind(cols.theme)
        .bind(cols.prompt)
        .bind(cols.options)
        .bind(cols.answer)
        .bind(cols.image)
        .bind(cols.image_description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM questions WHERE id = ?1")
            .bind(question_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn clear_questions(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM questions")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
