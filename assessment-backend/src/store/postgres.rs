use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{SessionStore, StoreTx, TestLock};
use crate::error::Result;
use crate::models::session_answer::SessionAnswer;
use crate::models::test::{IgnoredQuestion, QuestionCountRequirement, QuestionPointOverride, Test};
use crate::models::test_session::TestSession;

const SESSION_COLUMNS: &str = "id, test_id, user_id, status, max_points, points_earned, \
     started_at, completed_at, expires_at, created_at, updated_at";

const ANSWER_COLUMNS: &str = "id, session_id, question_id, order_index, points, \
     selected_option_ids, is_correct, points_earned";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn find_test(&mut self, test_id: Uuid) -> Result<Option<Test>> {
        let test = sqlx::query_as::<_, Test>(
            r#"SELECT id, title, description, duration_minutes, created_by, created_at, updated_at
               FROM tests WHERE id = $1"#,
        )
        .bind(test_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(test)
    }

    async fn find_test_locked(&mut self, test_id: Uuid, lock: TestLock) -> Result<Option<Test>> {
        let clause = match lock {
            TestLock::Shared => "FOR SHARE",
            TestLock::Exclusive => "FOR UPDATE",
        };
        let sql = format!(
            "SELECT id, title, description, duration_minutes, created_by, created_at, updated_at \
             FROM tests WHERE id = $1 {}",
            clause
        );
        let test = sqlx::query_as::<_, Test>(&sql)
            .bind(test_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(test)
    }

    async fn question_count_requirements(
        &mut self,
        test_id: Uuid,
    ) -> Result<Vec<QuestionCountRequirement>> {
        let rows = sqlx::query_as::<_, QuestionCountRequirement>(
            r#"SELECT id, test_id, position, number_of_questions, points_per_question
               FROM question_count_requirements
               WHERE test_id = $1
               ORDER BY position ASC"#,
        )
        .bind(test_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn collection_ids(&mut self, test_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT id FROM question_collections WHERE test_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(test_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids)
    }

    async fn ignored_question_ids(&mut self, test_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, IgnoredQuestion>(
            r#"SELECT test_id, question_id FROM ignored_questions WHERE test_id = $1"#,
        )
        .bind(test_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(|r| r.question_id).collect())
    }

    async fn point_overrides(&mut self, test_id: Uuid) -> Result<Vec<QuestionPointOverride>> {
        let rows = sqlx::query_as::<_, QuestionPointOverride>(
            r#"SELECT test_id, question_id, points FROM question_point_overrides WHERE test_id = $1"#,
        )
        .bind(test_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn questions_by_collections_and_points(
        &mut self,
        collection_ids: &[Uuid],
        points: i32,
        excluded: &HashSet<Uuid>,
    ) -> Result<Vec<Uuid>> {
        let excluded: Vec<Uuid> = excluded.iter().copied().collect();
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT id FROM questions
               WHERE collection_id = ANY($1)
                 AND points = $2
                 AND NOT (id = ANY($3))
               ORDER BY id"#,
        )
        .bind(collection_ids.to_vec())
        .bind(points)
        .bind(excluded)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids)
    }

    async fn questions_in_collections(
        &mut self,
        collection_ids: &[Uuid],
        question_ids: &[Uuid],
    ) -> Result<HashSet<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT id FROM questions WHERE id = ANY($1) AND collection_id = ANY($2)"#,
        )
        .bind(question_ids.to_vec())
        .bind(collection_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn correct_option_ids(
        &mut self,
        question_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, HashSet<Uuid>>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"SELECT question_id, id FROM question_options
               WHERE question_id = ANY($1) AND is_correct"#,
        )
        .bind(question_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await?;

        let mut map: HashMap<Uuid, HashSet<Uuid>> =
            question_ids.iter().map(|id| (*id, HashSet::new())).collect();
        for (question_id, option_id) in rows {
            map.entry(question_id).or_default().insert(option_id);
        }
        Ok(map)
    }

    async fn insert_session(&mut self, session: &TestSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO test_sessions (
                id, test_id, user_id, status, max_points, points_earned,
                started_at, completed_at, expires_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(session.id)
        .bind(session.test_id)
        .bind(session.user_id)
        .bind(session.status)
        .bind(session.max_points)
        .bind(session.points_earned)
        .bind(session.started_at)
        .bind(session.completed_at)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_session(&mut self, session_id: Uuid) -> Result<Option<TestSession>> {
        let session = sqlx::query_as::<_, TestSession>(&format!(
            "SELECT {} FROM test_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(session)
    }

    async fn find_session_for_update(&mut self, session_id: Uuid) -> Result<Option<TestSession>> {
        let session = sqlx::query_as::<_, TestSession>(&format!(
            "SELECT {} FROM test_sessions WHERE id = $1 FOR UPDATE",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(session)
    }

    async fn latest_open_session_for_update(
        &mut self,
        test_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<Option<TestSession>> {
        // A concurrent Start blocks here until the first commits, then sees
        // the row as in_progress.
        let session = sqlx::query_as::<_, TestSession>(&format!(
            r#"SELECT {} FROM test_sessions
               WHERE test_id = $1
                 AND user_id IS NOT DISTINCT FROM $2
                 AND status IN ('pending', 'in_progress')
               ORDER BY created_at DESC, id DESC
               LIMIT 1
               FOR UPDATE"#,
            SESSION_COLUMNS
        ))
        .bind(test_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(session)
    }

    async fn update_session(&mut self, session: &TestSession) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE test_sessions
            SET status = $2, max_points = $3, points_earned = $4,
                started_at = $5, completed_at = $6, expires_at = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(session.id)
        .bind(session.status)
        .bind(session.max_points)
        .bind(session.points_earned)
        .bind(session.started_at)
        .bind(session.completed_at)
        .bind(session.expires_at)
        .bind(session.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_answers(&mut self, answers: &[SessionAnswer]) -> Result<()> {
        if answers.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = answers.iter().map(|a| a.id).collect();
        let session_ids: Vec<Uuid> = answers.iter().map(|a| a.session_id).collect();
        let question_ids: Vec<Uuid> = answers.iter().map(|a| a.question_id).collect();
        let orders: Vec<i32> = answers.iter().map(|a| a.order_index).collect();
        let points: Vec<i32> = answers.iter().map(|a| a.points).collect();

        sqlx::query(
            r#"
            INSERT INTO session_answers (id, session_id, question_id, order_index, points)
            SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::uuid[], $4::int4[], $5::int4[])
            "#,
        )
        .bind(ids)
        .bind(session_ids)
        .bind(question_ids)
        .bind(orders)
        .bind(points)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn session_answers(&mut self, session_id: Uuid) -> Result<Vec<SessionAnswer>> {
        let rows = sqlx::query_as::<_, SessionAnswer>(&format!(
            "SELECT {} FROM session_answers WHERE session_id = $1 ORDER BY order_index ASC",
            ANSWER_COLUMNS
        ))
        .bind(session_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn update_answers(&mut self, answers: &[SessionAnswer]) -> Result<()> {
        for answer in answers {
            sqlx::query(
                r#"
                UPDATE session_answers
                SET selected_option_ids = $2, is_correct = $3, points_earned = $4
                WHERE id = $1
                "#,
            )
            .bind(answer.id)
            .bind(answer.selected_option_ids.clone())
            .bind(answer.is_correct)
            .bind(answer.points_earned)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn replace_requirements(
        &mut self,
        test_id: Uuid,
        tiers: &[QuestionCountRequirement],
    ) -> Result<()> {
        sqlx::query("DELETE FROM question_count_requirements WHERE test_id = $1")
            .bind(test_id)
            .execute(&mut *self.tx)
            .await?;

        let ids: Vec<Uuid> = tiers.iter().map(|t| t.id).collect();
        let positions: Vec<i32> = tiers.iter().map(|t| t.position).collect();
        let counts: Vec<i32> = tiers.iter().map(|t| t.number_of_questions).collect();
        let points: Vec<i32> = tiers.iter().map(|t| t.points_per_question).collect();

        sqlx::query(
            r#"
            INSERT INTO question_count_requirements
                (id, test_id, position, number_of_questions, points_per_question)
            SELECT t.id, $2, t.position, t.number_of_questions, t.points_per_question
            FROM UNNEST($1::uuid[], $3::int4[], $4::int4[], $5::int4[])
                AS t(id, position, number_of_questions, points_per_question)
            "#,
        )
        .bind(ids)
        .bind(test_id)
        .bind(positions)
        .bind(counts)
        .bind(points)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn replace_ignored_questions(
        &mut self,
        test_id: Uuid,
        question_ids: &[Uuid],
    ) -> Result<()> {
        sqlx::query("DELETE FROM ignored_questions WHERE test_id = $1")
            .bind(test_id)
            .execute(&mut *self.tx)
            .await?;

        sqlx::query(
            r#"INSERT INTO ignored_questions (test_id, question_id)
               SELECT $1, q FROM UNNEST($2::uuid[]) AS q"#,
        )
        .bind(test_id)
        .bind(question_ids.to_vec())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn replace_point_overrides(
        &mut self,
        test_id: Uuid,
        overrides: &[QuestionPointOverride],
    ) -> Result<()> {
        sqlx::query("DELETE FROM question_point_overrides WHERE test_id = $1")
            .bind(test_id)
            .execute(&mut *self.tx)
            .await?;

        let question_ids: Vec<Uuid> = overrides.iter().map(|o| o.question_id).collect();
        let points: Vec<i32> = overrides.iter().map(|o| o.points).collect();

        sqlx::query(
            r#"INSERT INTO question_point_overrides (test_id, question_id, points)
               SELECT $1, o.question_id, o.points
               FROM UNNEST($2::uuid[], $3::int4[]) AS o(question_id, points)"#,
        )
        .bind(test_id)
        .bind(question_ids)
        .bind(points)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
