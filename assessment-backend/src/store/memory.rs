use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{SessionStore, StoreTx, TestLock};
use crate::error::{Error, Result};
use crate::models::question::{Question, QuestionCollection, QuestionOption};
use crate::models::session_answer::SessionAnswer;
use crate::models::test::{QuestionCountRequirement, QuestionPointOverride, Test};
use crate::models::test_session::{SessionStatus, TestSession};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tests: HashMap<Uuid, Test>,
    collections: Vec<QuestionCollection>,
    questions: HashMap<Uuid, Question>,
    options: Vec<QuestionOption>,
    requirements: HashMap<Uuid, Vec<QuestionCountRequirement>>,
    ignored: HashMap<Uuid, Vec<Uuid>>,
    overrides: HashMap<Uuid, Vec<QuestionPointOverride>>,
    // Insertion order doubles as recency.
    sessions: Vec<TestSession>,
    answers: HashMap<Uuid, Vec<SessionAnswer>>,
    fail_answer_inserts: bool,
    // Locks taken by committed transactions, in order.
    test_locks: Vec<(Uuid, TestLock)>,
}

/// A question seeded into the in-memory store with its option ids.
#[derive(Debug, Clone)]
pub struct SeededQuestion {
    pub question: Question,
    pub correct_option_ids: Vec<Uuid>,
    pub incorrect_option_ids: Vec<Uuid>,
}

impl SeededQuestion {
    pub fn id(&self) -> Uuid {
        self.question.id
    }
}

/// Store backed by a single mutex-guarded state. A transaction holds the lock
/// for its whole lifetime and works on a copy, so transactions are serial and
/// a dropped transaction leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_test(&self, created_by: Uuid, duration_minutes: Option<i32>) -> Test {
        let now = Utc::now();
        let test = Test {
            id: Uuid::new_v4(),
            title: "Test".to_string(),
            description: None,
            duration_minutes,
            created_by,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.tests.insert(test.id, test.clone());
        test
    }

    pub async fn add_collection(&self, test_id: Uuid) -> QuestionCollection {
        let collection = QuestionCollection {
            id: Uuid::new_v4(),
            test_id,
            title: "Collection".to_string(),
            created_at: Utc::now(),
        };
        self.state.lock().await.collections.push(collection.clone());
        collection
    }

    pub async fn add_question(
        &self,
        collection_id: Uuid,
        points: i32,
        correct: usize,
        incorrect: usize,
    ) -> SeededQuestion {
        let question = Question {
            id: Uuid::new_v4(),
            collection_id,
            question: format!("Question worth {}", points),
            points,
            created_at: Utc::now(),
        };
        let mut state = self.state.lock().await;
        let mut correct_option_ids = Vec::with_capacity(correct);
        let mut incorrect_option_ids = Vec::with_capacity(incorrect);
        for i in 0..correct + incorrect {
            let is_correct = i < correct;
            let option = QuestionOption {
                id: Uuid::new_v4(),
                question_id: question.id,
                content: format!("Option {}", i + 1),
                is_correct,
            };
            if is_correct {
                correct_option_ids.push(option.id);
            } else {
                incorrect_option_ids.push(option.id);
            }
            state.options.push(option);
        }
        state.questions.insert(question.id, question.clone());
        SeededQuestion {
            question,
            correct_option_ids,
            incorrect_option_ids,
        }
    }

    /// Makes every subsequent answer insert fail, to exercise rollback.
    pub async fn set_fail_answer_inserts(&self, fail: bool) {
        self.state.lock().await.fail_answer_inserts = fail;
    }

    pub async fn session(&self, session_id: Uuid) -> Option<TestSession> {
        let state = self.state.lock().await;
        state.sessions.iter().find(|s| s.id == session_id).cloned()
    }

    pub async fn sessions_for_test(&self, test_id: Uuid) -> Vec<TestSession> {
        let state = self.state.lock().await;
        state.sessions.iter().filter(|s| s.test_id == test_id).cloned().collect()
    }

    /// Test row locks taken by committed transactions, oldest first.
    pub async fn test_locks(&self, test_id: Uuid) -> Vec<TestLock> {
        let state = self.state.lock().await;
        state
            .test_locks
            .iter()
            .filter(|(id, _)| *id == test_id)
            .map(|(_, lock)| *lock)
            .collect()
    }

    pub async fn answers(&self, session_id: Uuid) -> Vec<SessionAnswer> {
        let state = self.state.lock().await;
        state.answers.get(&session_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_test(&mut self, test_id: Uuid) -> Result<Option<Test>> {
        Ok(self.working.tests.get(&test_id).cloned())
    }

    async fn find_test_locked(&mut self, test_id: Uuid, lock: TestLock) -> Result<Option<Test>> {
        let test = self.working.tests.get(&test_id).cloned();
        if test.is_some() {
            self.working.test_locks.push((test_id, lock));
        }
        Ok(test)
    }

    async fn question_count_requirements(
        &mut self,
        test_id: Uuid,
    ) -> Result<Vec<QuestionCountRequirement>> {
        let mut tiers = self.working.requirements.get(&test_id).cloned().unwrap_or_default();
        tiers.sort_by_key(|t| t.position);
        Ok(tiers)
    }

    async fn collection_ids(&mut self, test_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .working
            .collections
            .iter()
            .filter(|c| c.test_id == test_id)
            .map(|c| c.id)
            .collect())
    }

    async fn ignored_question_ids(&mut self, test_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self.working.ignored.get(&test_id).cloned().unwrap_or_default())
    }

    async fn point_overrides(&mut self, test_id: Uuid) -> Result<Vec<QuestionPointOverride>> {
        Ok(self.working.overrides.get(&test_id).cloned().unwrap_or_default())
    }

    async fn questions_by_collections_and_points(
        &mut self,
        collection_ids: &[Uuid],
        points: i32,
        excluded: &HashSet<Uuid>,
    ) -> Result<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self
            .working
            .questions
            .values()
            .filter(|q| collection_ids.contains(&q.collection_id))
            .filter(|q| q.points == points && !excluded.contains(&q.id))
            .map(|q| q.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn questions_in_collections(
        &mut self,
        collection_ids: &[Uuid],
        question_ids: &[Uuid],
    ) -> Result<HashSet<Uuid>> {
        Ok(question_ids
            .iter()
            .filter_map(|id| self.working.questions.get(id))
            .filter(|q| collection_ids.contains(&q.collection_id))
            .map(|q| q.id)
            .collect())
    }

    async fn correct_option_ids(
        &mut self,
        question_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, HashSet<Uuid>>> {
        let mut map: HashMap<Uuid, HashSet<Uuid>> =
            question_ids.iter().map(|id| (*id, HashSet::new())).collect();
        for option in self.working.options.iter().filter(|o| o.is_correct) {
            if let Some(set) = map.get_mut(&option.question_id) {
                set.insert(option.id);
            }
        }
        Ok(map)
    }

    async fn insert_session(&mut self, session: &TestSession) -> Result<()> {
        self.working.sessions.push(session.clone());
        Ok(())
    }

    async fn find_session(&mut self, session_id: Uuid) -> Result<Option<TestSession>> {
        Ok(self.working.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn find_session_for_update(&mut self, session_id: Uuid) -> Result<Option<TestSession>> {
        self.find_session(session_id).await
    }

    async fn latest_open_session_for_update(
        &mut self,
        test_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<Option<TestSession>> {
        Ok(self
            .working
            .sessions
            .iter()
            .rev()
            .find(|s| {
                s.test_id == test_id
                    && s.user_id == user_id
                    && matches!(s.status, SessionStatus::Pending | SessionStatus::InProgress)
            })
            .cloned())
    }

    async fn update_session(&mut self, session: &TestSession) -> Result<()> {
        let slot = self
            .working
            .sessions
            .iter_mut()
            .find(|s| s.id == session.id)
            .ok_or_else(|| Error::NotFound("test session not found".to_string()))?;
        *slot = session.clone();
        Ok(())
    }

    async fn insert_answers(&mut self, answers: &[SessionAnswer]) -> Result<()> {
        if self.working.fail_answer_inserts {
            return Err(Error::Internal("answer insert rejected by store".to_string()));
        }
        for answer in answers {
            let existing = self.working.answers.entry(answer.session_id).or_default();
            if existing
                .iter()
                .any(|a| a.question_id == answer.question_id || a.order_index == answer.order_index)
            {
                return Err(Error::Internal(format!(
                    "duplicate session answer for question {}",
                    answer.question_id
                )));
            }
            existing.push(answer.clone());
        }
        Ok(())
    }

    async fn session_answers(&mut self, session_id: Uuid) -> Result<Vec<SessionAnswer>> {
        let mut answers = self.working.answers.get(&session_id).cloned().unwrap_or_default();
        answers.sort_by_key(|a| a.order_index);
        Ok(answers)
    }

    async fn update_answers(&mut self, answers: &[SessionAnswer]) -> Result<()> {
        for answer in answers {
            let slot = self
                .working
                .answers
                .get_mut(&answer.session_id)
                .and_then(|list| list.iter_mut().find(|a| a.id == answer.id))
                .ok_or_else(|| Error::NotFound("session answer not found".to_string()))?;
            *slot = answer.clone();
        }
        Ok(())
    }

    async fn replace_requirements(
        &mut self,
        test_id: Uuid,
        tiers: &[QuestionCountRequirement],
    ) -> Result<()> {
        self.working.requirements.insert(test_id, tiers.to_vec());
        Ok(())
    }

    async fn replace_ignored_questions(
        &mut self,
        test_id: Uuid,
        question_ids: &[Uuid],
    ) -> Result<()> {
        self.working.ignored.insert(test_id, question_ids.to_vec());
        Ok(())
    }

    async fn replace_point_overrides(
        &mut self,
        test_id: Uuid,
        overrides: &[QuestionPointOverride],
    ) -> Result<()> {
        self.working.overrides.insert(test_id, overrides.to_vec());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
