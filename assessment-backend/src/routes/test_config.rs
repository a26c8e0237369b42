use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use uuid::Uuid;

use crate::dto::config_dto::{
    ReplaceIgnoredQuestionsRequest, ReplacePointOverridesRequest, ReplaceTiersRequest,
};
use crate::middleware::auth::Claims;
use crate::models::test::{QuestionCountRequirement, QuestionPointOverride};
use crate::services::config_resolver::TestConfiguration;
use crate::AppState;

#[axum::debug_handler]
pub async fn get_configuration(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> crate::error::Result<Json<TestConfiguration>> {
    let config = state
        .test_config_service
        .get_configuration(claims.user_id()?, test_id)
        .await?;
    Ok(Json(config))
}

#[axum::debug_handler]
pub async fn replace_requirements(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReplaceTiersRequest>,
) -> crate::error::Result<Json<Vec<QuestionCountRequirement>>> {
    let tiers = state
        .test_config_service
        .replace_tiers(claims.user_id()?, test_id, req)
        .await?;
    Ok(Json(tiers))
}

#[axum::debug_handler]
pub async fn replace_ignored_questions(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReplaceIgnoredQuestionsRequest>,
) -> crate::error::Result<Json<Vec<Uuid>>> {
    let ids = state
        .test_config_service
        .replace_ignored_questions(claims.user_id()?, test_id, req)
        .await?;
    Ok(Json(ids))
}

#[axum::debug_handler]
pub async fn replace_point_overrides(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReplacePointOverridesRequest>,
) -> crate::error::Result<Json<Vec<QuestionPointOverride>>> {
    let overrides = state
        .test_config_service
        .replace_point_overrides(claims.user_id()?, test_id, req)
        .await?;
    Ok(Json(overrides))
}
