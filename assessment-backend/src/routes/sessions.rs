use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::dto::session_dto::{
    SessionAnswerResponse, SessionDetailsResponse, SessionResponse, SubmitSessionRequest,
};
use crate::middleware::auth::{caller_id, Claims};
use crate::services::session_service::SessionDetails;
use crate::utils::validation::validate;
use crate::AppState;

fn details_response(details: SessionDetails) -> SessionDetailsResponse {
    SessionDetailsResponse {
        session: details.session.into(),
        answers: details
            .answers
            .into_iter()
            .map(SessionAnswerResponse::from)
            .collect(),
    }
}

#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    claims: Option<Extension<Claims>>,
) -> crate::error::Result<Response> {
    let user_id = caller_id(claims.as_deref())?;
    let session = state.session_service.create_session(test_id, user_id).await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))).into_response())
}

/// Returns the started session together with its generated questions.
#[axum::debug_handler]
pub async fn start_session(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    claims: Option<Extension<Claims>>,
) -> crate::error::Result<Json<SessionDetailsResponse>> {
    let user_id = caller_id(claims.as_deref())?;
    let session = state.session_service.start_session(user_id, test_id).await?;
    let details = state.session_service.get_session(user_id, session.id).await?;
    Ok(Json(details_response(details)))
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    claims: Option<Extension<Claims>>,
) -> crate::error::Result<Json<SessionDetailsResponse>> {
    let user_id = caller_id(claims.as_deref())?;
    let details = state.session_service.get_session(user_id, session_id).await?;
    Ok(Json(details_response(details)))
}

#[axum::debug_handler]
pub async fn submit_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    claims: Option<Extension<Claims>>,
    Json(req): Json<SubmitSessionRequest>,
) -> crate::error::Result<Json<SessionResponse>> {
    validate(&req)?;
    let user_id = caller_id(claims.as_deref())?;
    let session = state
        .session_service
        .submit_session(user_id, session_id, req.answers)
        .await?;
    Ok(Json(session.into()))
}
