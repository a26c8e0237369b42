//! Transactional persistence for the session engine.
//!
//! Every mutating operation runs inside one `StoreTx`. Dropping a transaction
//! without calling [`StoreTx::commit`] rolls it back, which is also what
//! happens when the calling future is cancelled.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::session_answer::SessionAnswer;
use crate::models::test::{QuestionCountRequirement, QuestionPointOverride, Test};
use crate::models::test_session::TestSession;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Row lock taken on a test while its configuration is read or replaced.
/// Readers share the row, so a replace waits for in-flight generations and
/// a resolve never sees half of a replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestLock {
    Shared,
    Exclusive,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn find_test(&mut self, test_id: Uuid) -> Result<Option<Test>>;

    /// Loads a test and holds `lock` on its row until the transaction ends.
    async fn find_test_locked(&mut self, test_id: Uuid, lock: TestLock) -> Result<Option<Test>>;

    /// Tiers in configuration order (`position` ascending).
    async fn question_count_requirements(
        &mut self,
        test_id: Uuid,
    ) -> Result<Vec<QuestionCountRequirement>>;

    async fn collection_ids(&mut self, test_id: Uuid) -> Result<Vec<Uuid>>;

    async fn ignored_question_ids(&mut self, test_id: Uuid) -> Result<Vec<Uuid>>;

    async fn point_overrides(&mut self, test_id: Uuid) -> Result<Vec<QuestionPointOverride>>;

    /// Ids of questions in `collection_ids` worth exactly `points`, minus `excluded`.
    async fn questions_by_collections_and_points(
        &mut self,
        collection_ids: &[Uuid],
        points: i32,
        excluded: &HashSet<Uuid>,
    ) -> Result<Vec<Uuid>>;

    /// Of `question_ids`, those that exist inside one of `collection_ids`.
    async fn questions_in_collections(
        &mut self,
        collection_ids: &[Uuid],
        question_ids: &[Uuid],
    ) -> Result<HashSet<Uuid>>;

    /// Correct option ids keyed by question. Questions without a correct
    /// option map to an empty set.
    async fn correct_option_ids(
        &mut self,
        question_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, HashSet<Uuid>>>;

    async fn insert_session(&mut self, session: &TestSession) -> Result<()>;

    async fn find_session(&mut self, session_id: Uuid) -> Result<Option<TestSession>>;

    /// Loads a session and locks it for the rest of the transaction.
    async fn find_session_for_update(&mut self, session_id: Uuid) -> Result<Option<TestSession>>;

    /// Most recent Pending or InProgress session for (test, user), locked.
    /// `None` matches only sessions without a user, so anonymous sessions
    /// are shared between all anonymous callers.
    async fn latest_open_session_for_update(
        &mut self,
        test_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<Option<TestSession>>;

    async fn update_session(&mut self, session: &TestSession) -> Result<()>;

    async fn insert_answers(&mut self, answers: &[SessionAnswer]) -> Result<()>;

    /// Answers ordered by `order_index`.
    async fn session_answers(&mut self, session_id: Uuid) -> Result<Vec<SessionAnswer>>;

    async fn update_answers(&mut self, answers: &[SessionAnswer]) -> Result<()>;

    async fn replace_requirements(
        &mut self,
        test_id: Uuid,
        tiers: &[QuestionCountRequirement],
    ) -> Result<()>;

    async fn replace_ignored_questions(&mut self, test_id: Uuid, question_ids: &[Uuid])
        -> Result<()>;

    async fn replace_point_overrides(
        &mut self,
        test_id: Uuid,
        overrides: &[QuestionPointOverride],
    ) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

pub type SharedStore = Arc<dyn SessionStore>;
