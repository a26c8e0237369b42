use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionCollection {
    pub id: Uuid,
    pub test_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// `points` is the tier-matching value and never changes per test;
/// per-test re-weighting lives in `QuestionPointOverride`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub question: String,
    pub points: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub content: String,
    pub is_correct: bool,
}
