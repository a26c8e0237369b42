use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    InProgress,
    Completed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestSession {
    pub id: Uuid,
    pub test_id: Uuid,
    pub user_id: Option<Uuid>,
    pub status: SessionStatus,
    pub max_points: i32,
    pub points_earned: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestSession {
    pub fn pending(test_id: Uuid, user_id: Option<Uuid>, max_points: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            test_id,
            user_id,
            status: SessionStatus::Pending,
            max_points,
            points_earned: None,
            started_at: None,
            completed_at: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }
}
