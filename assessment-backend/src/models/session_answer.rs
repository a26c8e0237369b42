use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A generated slot in a session. `order_index` and `points` are frozen at
/// generation; the remaining fields are filled in on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SessionAnswer {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub order_index: i32,
    pub points: i32,
    pub selected_option_ids: Option<Vec<Uuid>>,
    pub is_correct: Option<bool>,
    pub points_earned: Option<i32>,
}

impl SessionAnswer {
    pub fn placeholder(session_id: Uuid, question_id: Uuid, order_index: i32, points: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            question_id,
            order_index,
            points,
            selected_option_ids: None,
            is_correct: None,
            points_earned: None,
        }
    }
}
