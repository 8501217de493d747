use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use sqlx::PgPool;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{config::Settings, state::AppState};
use crate::db;
use crate::repositories::{seed, MemoryStore};
use crate::services::answer_codec::AnswerCodec;
use crate::services::submission_lifecycle::ExamEngine;

/// Two-question paper worth 15 points, a retakeable paper and a shuffled paper.
pub(crate) const SCENARIO_SEED: &str = r#"{
    "questions": [
        {
            "id": "q-choice",
            "kind": "choice",
            "content": "Which option is correct?",
            "choices": [
                {"id": "A", "content": "This one is wrong", "is_correct": false},
                {"id": "B", "content": "This one is right", "is_correct": true}
            ]
        },
        {
            "id": "q-fill",
            "kind": "fill_in_blank",
            "text_with_blanks": "The capital of France is _____.",
            "answer": "Paris"
        }
    ],
    "papers": [
        {
            "id": "p-mixed",
            "title": "Mixed paper",
            "passing_score": 10,
            "questions": [
                {"id": "slot-choice", "question_id": "q-choice", "order_index": 0, "score": 10},
                {"id": "slot-fill", "question_id": "q-fill", "order_index": 1, "score": 5}
            ]
        },
        {
            "id": "p-retake",
            "title": "Retake paper",
            "allow_retake": true,
            "max_retake_count": 2,
            "passing_score": 5,
            "questions": [
                {"id": "retake-fill", "question_id": "q-fill", "score": 5}
            ]
        },
        {
            "id": "p-shuffle",
            "title": "Shuffled paper",
            "shuffle_questions": true,
            "questions": [
                {"id": "shuffle-1", "question_id": "q-choice", "order_index": 0},
                {"id": "shuffle-2", "question_id": "q-fill", "order_index": 1},
                {"id": "shuffle-3", "question_id": "q-choice", "order_index": 2},
                {"id": "shuffle-4", "question_id": "q-fill", "order_index": 3}
            ]
        }
    ]
}"#;

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("EXAM_ENV", "test");
    std::env::set_var("EXAM_STRICT_CONFIG", "0");
    std::env::set_var("EXAM_DB_TYPE", "in-memory");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("PROJECT_NAME");
    std::env::remove_var("API_V1_STR");
    std::env::remove_var("QUESTION_BANK_SEED");
    std::env::remove_var("ANSWER_PAYLOAD_MAX_CHARS");
}

pub(crate) async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let scenario = seed::parse(SCENARIO_SEED).expect("scenario seed");
    seed::apply_to_memory(&store, scenario).await;
    store
}

pub(crate) async fn seeded_engine() -> (ExamEngine, Arc<MemoryStore>) {
    let store = seeded_store().await;
    let engine = ExamEngine::new(store.clone(), store.clone(), AnswerCodec::default());
    (engine, store)
}

/// Migrated, emptied database from `DATABASE_URL`, or `None` when it is unset.
pub(crate) async fn test_pg_pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("connect test database");
    db::run_migrations(&pool).await.expect("migrate test database");
    reset_db(&pool).await.expect("reset test database");
    Some(pool)
}

pub(crate) async fn reset_db(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "TRUNCATE exam_paper_question_answers, exam_paper_submissions, exam_paper_questions, \
         choices, questions, exam_papers CASCADE",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn build_state(settings: Settings) -> AppState {
    let store = seeded_store().await;
    let codec = AnswerCodec::new(settings.engine().answer_payload_max_chars);
    let engine = ExamEngine::new(store.clone(), store, codec);
    AppState::new(settings, engine)
}

pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let state = build_state(settings).await;
    let app = api::router::router(state.clone());

    TestContext { state, app, _guard: guard }
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) fn text_request(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(body.to_string()))
        .expect("request body")
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
