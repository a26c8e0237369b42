use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TierInput {
    #[validate(range(min = 0, max = 1000))]
    pub number_of_questions: i32,
    #[validate(range(min = 0, max = 10000))]
    pub points_per_question: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReplaceTiersRequest {
    #[validate(length(min = 1, max = 100, message = "tier list must hold 1 to 100 tiers"))]
    #[validate(nested)]
    pub tiers: Vec<TierInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReplaceIgnoredQuestionsRequest {
    #[validate(length(max = 10000))]
    pub question_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PointOverrideInput {
    pub question_id: Uuid,
    #[validate(range(min = 0, max = 10000))]
    pub points: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReplacePointOverridesRequest {
    #[validate(nested)]
    pub overrides: Vec<PointOverrideInput>,
}
