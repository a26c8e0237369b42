use std::env;
use std::sync::Arc;

use assessment_backend::middleware::auth::Claims;
use assessment_backend::store::InMemoryStore;
use assessment_backend::{routes, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test_secret_key";

fn setup(store: &InMemoryStore) -> Router {
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("DATABASE_URL", "postgres://localhost/unused");
    env::set_var("JWT_SECRET", SECRET);
    let _ = assessment_backend::config::init_config();
    routes::router(AppState::new(Arc::new(store.clone())))
}

fn token(user_id: Uuid) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("encode token")
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<Uuid>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => req.body(Body::empty()),
    }
    .expect("request");

    let resp = app.clone().oneshot(req).await.expect("response");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    let json = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
    (status, json)
}

#[tokio::test]
async fn owner_configures_a_test() {
    let store = InMemoryStore::new();
    let app = setup(&store);
    let owner = Uuid::new_v4();
    let test = store.add_test(owner, None).await;
    let collection = store.add_collection(test.id).await;
    let q1 = store.add_question(collection.id, 5, 1, 1).await;
    let q2 = store.add_question(collection.id, 10, 1, 1).await;

    let (status, tiers) = send(
        &app,
        "PUT",
        &format!("/api/tests/{}/requirements", test.id),
        Some(owner),
        Some(json!({ "tiers": [
            { "number_of_questions": 2, "points_per_question": 5 },
            { "number_of_questions": 3, "points_per_question": 10 }
        ] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tiers.as_array().expect("tiers").len(), 2);
    assert_eq!(tiers[1]["position"], 1);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/tests/{}/ignored-questions", test.id),
        Some(owner),
        Some(json!({ "question_ids": [q1.id()] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/tests/{}/point-overrides", test.id),
        Some(owner),
        Some(json!({ "overrides": [{ "question_id": q2.id(), "points": 12 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, config) = send(
        &app,
        "GET",
        &format!("/api/tests/{}/configuration", test.id),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["tiers"][0], json!({ "count": 2, "points": 5 }));
    assert_eq!(config["ignored_question_ids"], json!([q1.id()]));
    assert_eq!(config["point_overrides"][q2.id().to_string()], 12);
}

#[tokio::test]
async fn configuration_requires_a_bearer_token_and_ownership() {
    let store = InMemoryStore::new();
    let app = setup(&store);
    let test = store.add_test(Uuid::new_v4(), None).await;
    let uri = format!("/api/tests/{}/configuration", test.id);

    let (status, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_authorization");

    let (status, _) = send(&app, "GET", &uri, Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_tier_list_is_a_bad_request() {
    let store = InMemoryStore::new();
    let app = setup(&store);
    let owner = Uuid::new_v4();
    let test = store.add_test(owner, None).await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/tests/{}/requirements", test.id),
        Some(owner),
        Some(json!({ "tiers": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().expect("error").contains("empty tier list"));
}

#[tokio::test]
async fn overrides_for_foreign_questions_are_not_found() {
    let store = InMemoryStore::new();
    let app = setup(&store);
    let owner = Uuid::new_v4();
    let test = store.add_test(owner, None).await;
    let other = store.add_collection(Uuid::new_v4()).await;
    let foreign = store.add_question(other.id, 5, 1, 1).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/tests/{}/point-overrides", test.id),
        Some(owner),
        Some(json!({ "overrides": [{ "question_id": foreign.id(), "points": 3 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
