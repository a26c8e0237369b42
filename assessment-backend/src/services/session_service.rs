use chrono::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::session_dto::SubmittedAnswer;
use crate::error::{Error, Result};
use crate::models::session_answer::SessionAnswer;
use crate::models::test::Test;
use crate::models::test_session::{SessionStatus, TestSession};
use crate::services::config_resolver::{checked_points_total, resolve_configuration};
use crate::services::generator::SessionGenerator;
use crate::services::grading_service::{GradingService, ScoringPolicy};
use crate::services::sampler::{FillPolicy, RandomSampler, Sampler};
use crate::store::{SharedStore, StoreTx};
use crate::utils::time::Clock;

#[derive(Debug, Clone)]
pub struct SessionDetails {
    pub session: TestSession,
    pub answers: Vec<SessionAnswer>,
}

/// Drives a session through Pending -> InProgress -> Completed | Expired.
/// Each call is one transaction; nothing is held between calls.
#[derive(Clone)]
pub struct SessionService {
    store: SharedStore,
    sampler: Arc<dyn Sampler>,
    scoring_policy: ScoringPolicy,
    fill_policy: FillPolicy,
    clock: Clock,
}

impl SessionService {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            sampler: Arc::new(RandomSampler::new()),
            scoring_policy: ScoringPolicy::default(),
            fill_policy: FillPolicy::default(),
            clock: Clock::system(),
        }
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_scoring_policy(mut self, policy: ScoringPolicy) -> Self {
        self.scoring_policy = policy;
        self
    }

    pub fn with_fill_policy(mut self, policy: FillPolicy) -> Self {
        self.fill_policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn create_session(&self, test_id: Uuid, user_id: Option<Uuid>) -> Result<TestSession> {
        let mut tx = self.store.begin().await?;
        let config = resolve_configuration(tx.as_mut(), test_id).await?;

        let session = TestSession::pending(
            test_id,
            user_id,
            config.configured_max_points()?,
            self.clock.now(),
        );
        tx.insert_session(&session).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            test_id = %test_id,
            user_id = ?user_id,
            max_points = session.max_points,
            "test session created"
        );
        Ok(session)
    }

    /// Starts the caller's latest open session for `test_id`. A session that
    /// is already InProgress comes back untouched.
    pub async fn start_session(&self, user_id: Option<Uuid>, test_id: Uuid) -> Result<TestSession> {
        let mut tx = self.store.begin().await?;
        let test = find_test(tx.as_mut(), test_id).await?;

        let mut session = tx
            .latest_open_session_for_update(test_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound("test session not found".to_string()))?;

        if session.status == SessionStatus::InProgress {
            tracing::info!(session_id = %session.id, "test session already in progress");
            return Ok(session);
        }

        let config = resolve_configuration(tx.as_mut(), test_id).await?;
        let answers = SessionGenerator::new(self.sampler.as_ref(), self.fill_policy)
            .generate(tx.as_mut(), &session, &config)
            .await?;

        let now = self.clock.now();
        session.status = SessionStatus::InProgress;
        session.started_at = Some(now);
        session.expires_at = test
            .duration_minutes
            .map(|minutes| now + Duration::minutes(i64::from(minutes)));
        session.max_points = checked_points_total(answers.iter().map(|a| a.points))?;
        session.updated_at = now;
        tx.update_session(&session).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            test_id = %test_id,
            answers = answers.len(),
            max_points = session.max_points,
            expires_at = ?session.expires_at,
            "test session started"
        );
        Ok(session)
    }

    pub async fn submit_session(
        &self,
        user_id: Option<Uuid>,
        session_id: Uuid,
        submitted: Vec<SubmittedAnswer>,
    ) -> Result<TestSession> {
        let mut tx = self.store.begin().await?;
        let mut session = tx
            .find_session_for_update(session_id)
            .await?
            .ok_or_else(|| Error::NotFound("test session not found".to_string()))?;
        let test = find_test(tx.as_mut(), session.test_id).await?;
        authorize(&session, &test, user_id)?;

        match session.status {
            SessionStatus::InProgress => {}
            SessionStatus::Pending => {
                return Err(Error::InvalidState("test session has not been started".to_string()))
            }
            SessionStatus::Completed => {
                return Err(Error::InvalidState("test session already completed".to_string()))
            }
            SessionStatus::Expired => {
                return Err(Error::InvalidState("test session has expired".to_string()))
            }
        }

        let now = self.clock.now();
        if session.is_expired_at(now) {
            session.status = SessionStatus::Expired;
            session.updated_at = now;
            tx.update_session(&session).await?;
            tx.commit().await?;

            tracing::warn!(
                session_id = %session.id,
                expires_at = ?session.expires_at,
                "submission after deadline, session expired"
            );
            return Err(Error::Expired(format!(
                "test session expired at {}",
                session.expires_at.map(|t| t.to_rfc3339()).unwrap_or_default()
            )));
        }

        let generated = tx.session_answers(session.id).await?;
        let selections = match_submission(&generated, submitted)?;

        let question_ids: Vec<Uuid> = generated.iter().map(|a| a.question_id).collect();
        let correct = tx.correct_option_ids(&question_ids).await?;
        let outcome =
            GradingService::grade(self.scoring_policy, &generated, &selections, &correct)?;

        tx.update_answers(&outcome.answers).await?;
        session.status = SessionStatus::Completed;
        session.points_earned = Some(outcome.points_earned);
        session.completed_at = Some(now);
        session.updated_at = now;
        tx.update_session(&session).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            points_earned = outcome.points_earned,
            max_points = session.max_points,
            "test session completed"
        );
        Ok(session)
    }

    pub async fn get_session(&self, user_id: Option<Uuid>, session_id: Uuid) -> Result<SessionDetails> {
        let mut tx = self.store.begin().await?;
        let session = tx
            .find_session(session_id)
            .await?
            .ok_or_else(|| Error::NotFound("test session not found".to_string()))?;
        let test = find_test(tx.as_mut(), session.test_id).await?;
        authorize(&session, &test, user_id)?;
        let answers = tx.session_answers(session.id).await?;
        Ok(SessionDetails { session, answers })
    }
}

async fn find_test(tx: &mut dyn StoreTx, test_id: Uuid) -> Result<Test> {
    tx.find_test(test_id)
        .await?
        .ok_or_else(|| Error::NotFound("test not found".to_string()))
}

/// The session's own user, or the test's creator reviewing it.
///
/// Sessions created without a user are shared: every anonymous caller
/// matches them, so for those the session id is the only credential.
fn authorize(session: &TestSession, test: &Test, user_id: Option<Uuid>) -> Result<()> {
    if session.user_id == user_id || test.is_owner(user_id) {
        return Ok(());
    }
    tracing::warn!(session_id = %session.id, user_id = ?user_id, "session access denied");
    Err(Error::Unauthorized(
        "test session does not belong to caller".to_string(),
    ))
}

/// Joins a submission to the generated answers by question id. Every
/// generated question must be answered exactly once and nothing else.
fn match_submission(
    generated: &[SessionAnswer],
    submitted: Vec<SubmittedAnswer>,
) -> Result<HashMap<Uuid, Vec<Uuid>>> {
    if submitted.len() != generated.len() {
        return Err(Error::AnswersMismatch(format!(
            "expected {} answers, got {}",
            generated.len(),
            submitted.len()
        )));
    }

    let expected: HashSet<Uuid> = generated.iter().map(|a| a.question_id).collect();
    let mut selections = HashMap::with_capacity(submitted.len());
    for answer in submitted {
        if !expected.contains(&answer.question_id) {
            return Err(Error::AnswersMismatch(format!(
                "question {} is not part of this session",
                answer.question_id
            )));
        }
        let question_id = answer.question_id;
        if selections.insert(question_id, answer.selected_option_ids).is_some() {
            return Err(Error::AnswersMismatch(format!(
                "question {} answered more than once",
                question_id
            )));
        }
    }
    Ok(selections)
}
