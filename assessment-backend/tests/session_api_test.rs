use std::env;
use std::sync::Arc;

use assessment_backend::middleware::auth::Claims;
use assessment_backend::store::{InMemoryStore, SessionStore};
use assessment_backend::models::test::QuestionCountRequirement;
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

async fn call(
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
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

async fn seed_tiers(store: &InMemoryStore, test_id: Uuid, tiers: &[(i32, i32)]) {
    let requirements: Vec<QuestionCountRequirement> = tiers
        .iter()
        .enumerate()
        .map(|(i, &(count, points))| QuestionCountRequirement {
            id: Uuid::new_v4(),
            test_id,
            position: i as i32,
            number_of_questions: count,
            points_per_question: points,
        })
        .collect();
    let mut tx = store.begin().await.expect("begin");
    tx.replace_requirements(test_id, &requirements)
        .await
        .expect("tiers");
    tx.commit().await.expect("commit");
}

#[tokio::test]
async fn health_reports_ok() {
    let store = InMemoryStore::new();
    let app = setup(&store);
    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn session_flow_end_to_end() {
    let store = InMemoryStore::new();
    let app = setup(&store);
    let owner = Uuid::new_v4();
    let candidate = Uuid::new_v4();
    let test = store.add_test(owner, Some(60)).await;
    let collection = store.add_collection(test.id).await;
    let mut questions = Vec::new();
    for _ in 0..3 {
        questions.push(store.add_question(collection.id, 5, 1, 3).await);
    }
    for _ in 0..4 {
        questions.push(store.add_question(collection.id, 10, 1, 3).await);
    }
    seed_tiers(&store, test.id, &[(2, 5), (3, 10)]).await;

    let (status, created) = call(
        &app,
        "POST",
        &format!("/api/tests/{}/sessions", test.id),
        Some(candidate),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["max_points"], 40);

    let (status, started) = call(
        &app,
        "POST",
        &format!("/api/tests/{}/sessions/start", test.id),
        Some(candidate),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["session"]["status"], "in_progress");
    assert!(started["session"]["expires_at"].is_string());
    let answers = started["answers"].as_array().expect("answers").clone();
    assert_eq!(answers.len(), 5);
    for (i, answer) in answers.iter().enumerate() {
        assert_eq!(answer["order"], i as i64);
        assert!(answer["is_correct"].is_null());
    }

    let session_id = started["session"]["id"].as_str().expect("id").to_string();
    let submission: Vec<JsonValue> = answers
        .iter()
        .map(|a| {
            let qid: Uuid = a["question_id"].as_str().expect("qid").parse().expect("uuid");
            let q = questions.iter().find(|q| q.id() == qid).expect("seeded");
            json!({ "question_id": qid, "selected_option_ids": q.correct_option_ids })
        })
        .collect();

    let (status, completed) = call(
        &app,
        "POST",
        &format!("/api/sessions/{}/submit", session_id),
        Some(candidate),
        Some(json!({ "answers": submission })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["points_earned"], 40);

    let (status, review) = call(
        &app,
        "GET",
        &format!("/api/sessions/{}", session_id),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(review["answers"]
        .as_array()
        .expect("answers")
        .iter()
        .all(|a| a["is_correct"] == true));

    let (status, body) = call(
        &app,
        "GET",
        &format!("/api/sessions/{}", session_id),
        Some(Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().expect("error").starts_with("unauthorized"));
}

#[tokio::test]
async fn anonymous_session_with_wrong_answer_count() {
    let store = InMemoryStore::new();
    let app = setup(&store);
    let test = store.add_test(Uuid::new_v4(), None).await;
    let collection = store.add_collection(test.id).await;
    for _ in 0..2 {
        store.add_question(collection.id, 5, 1, 1).await;
    }
    seed_tiers(&store, test.id, &[(2, 5)]).await;

    let (status, _) = call(&app, "POST", &format!("/api/tests/{}/sessions", test.id), None, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, started) = call(
        &app,
        "POST",
        &format!("/api/tests/{}/sessions/start", test.id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(started["session"]["user_id"].is_null());
    let session_id = started["session"]["id"].as_str().expect("id").to_string();
    let first = started["answers"][0]["question_id"].clone();

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/sessions/{}/submit", session_id),
        None,
        Some(json!({ "answers": [{ "question_id": first, "selected_option_ids": [] }] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().expect("error").starts_with("answers don't match"));
}

#[tokio::test]
async fn submit_before_start_conflicts() {
    let store = InMemoryStore::new();
    let app = setup(&store);
    let user = Uuid::new_v4();
    let test = store.add_test(Uuid::new_v4(), None).await;
    seed_tiers(&store, test.id, &[(1, 5)]).await;

    let (_, created) = call(
        &app,
        "POST",
        &format!("/api/tests/{}/sessions", test.id),
        Some(user),
        None,
    )
    .await;
    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/sessions/{}/submit", created["id"].as_str().expect("id")),
        Some(user),
        Some(json!({ "answers": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().expect("error").starts_with("invalid state"));
}

#[tokio::test]
async fn unknown_session_and_bad_token() {
    let store = InMemoryStore::new();
    let app = setup(&store);

    let (status, body) = call(
        &app,
        "GET",
        &format!("/api/sessions/{}", Uuid::new_v4()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found: test session not found");

    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/sessions/{}", Uuid::new_v4()))
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .expect("request");
    let resp = app.clone().oneshot(req).await.expect("response");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
