use axum::{
    middleware::from_fn,
    routing::{get, post, put},
    Router,
};

use crate::middleware::auth::{optional_bearer_auth, require_bearer_auth};
use crate::AppState;

pub mod health;
pub mod sessions;
pub mod test_config;

pub fn router(state: AppState) -> Router {
    let session_api = Router::new()
        .route(
            "/api/tests/:test_id/sessions",
            post(sessions::create_session),
        )
        .route(
            "/api/tests/:test_id/sessions/start",
            post(sessions::start_session),
        )
        .route("/api/sessions/:session_id", get(sessions::get_session))
        .route(
            "/api/sessions/:session_id/submit",
            post(sessions::submit_session),
        )
        .route_layer(from_fn(optional_bearer_auth));

    let config_api = Router::new()
        .route(
            "/api/tests/:test_id/configuration",
            get(test_config::get_configuration),
        )
        .route(
            "/api/tests/:test_id/requirements",
            put(test_config::replace_requirements),
        )
        .route(
            "/api/tests/:test_id/ignored-questions",
            put(test_config::replace_ignored_questions),
        )
        .route(
            "/api/tests/:test_id/point-overrides",
            put(test_config::replace_point_overrides),
        )
        .route_layer(from_fn(require_bearer_auth));

    Router::new()
        .route("/health", get(health::health))
        .merge(session_api)
        .merge(config_api)
        .with_state(state)
}
