use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::session_answer::SessionAnswer;
use crate::models::test_session::{SessionStatus, TestSession};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    #[serde(default)]
    pub selected_option_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitSessionRequest {
    #[validate(length(max = 1000))]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub test_id: Uuid,
    pub user_id: Option<Uuid>,
    pub status: SessionStatus,
    pub max_points: i32,
    pub points_earned: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<TestSession> for SessionResponse {
    fn from(session: TestSession) -> Self {
        Self {
            id: session.id,
            test_id: session.test_id,
            user_id: session.user_id,
            status: session.status,
            max_points: session.max_points,
            points_earned: session.points_earned,
            started_at: session.started_at,
            completed_at: session.completed_at,
            expires_at: session.expires_at,
        }
    }
}

/// Answer as shown to the caller; grading fields stay null until submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAnswerResponse {
    pub question_id: Uuid,
    pub order: i32,
    pub points: i32,
    pub selected_option_ids: Option<Vec<Uuid>>,
    pub is_correct: Option<bool>,
    pub points_earned: Option<i32>,
}

impl From<SessionAnswer> for SessionAnswerResponse {
    fn from(answer: SessionAnswer) -> Self {
        Self {
            question_id: answer.question_id,
            order: answer.order_index,
            points: answer.points,
            selected_option_ids: answer.selected_option_ids,
            is_correct: answer.is_correct,
            points_earned: answer.points_earned,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetailsResponse {
    pub session: SessionResponse,
    pub answers: Vec<SessionAnswerResponse>,
}
