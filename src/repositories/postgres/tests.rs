use std::sync::Arc;

use time::Duration;

use super::*;
use crate::core::time::primitive_now_utc;
use crate::repositories::seed;
use crate::services::answer_codec::AnswerCodec;
use crate::services::grading::GradeSheet;
use crate::services::score_aggregator::ScoreSummary;
use crate::services::submission_lifecycle::{EngineError, ExamEngine};
use crate::test_support::{env_lock, test_pg_pool, SCENARIO_SEED};

const CHOICE_B: &str = r#"{"type":"ChoiceAnswer","selectedChoiceIds":["B"]}"#;
const FILL_PARIS: &str = r#"{"type":"FillInBlankAnswer","filledText":" PARIS "}"#;

/// Two choice questions that both label their options A and B.
const SHARED_CHOICE_IDS: &str = r#"{
    "questions": [
        {
            "id": "q-first",
            "kind": "choice",
            "content": "First?",
            "choices": [
                {"id": "A", "content": "yes", "is_correct": true},
                {"id": "B", "content": "no"}
            ]
        },
        {
            "id": "q-second",
            "kind": "choice",
            "content": "Second?",
            "choices": [
                {"id": "A", "content": "no"},
                {"id": "B", "content": "yes", "is_correct": true}
            ]
        }
    ],
    "papers": [
        {
            "id": "p-shared",
            "title": "Shared labels",
            "questions": [
                {"id": "shared-1", "question_id": "q-first", "order_index": 0},
                {"id": "shared-2", "question_id": "q-second", "order_index": 1}
            ]
        }
    ]
}"#;

async fn seeded_pg_store(pool: &PgPool) -> Arc<PgStore> {
    let scenario = seed::parse(SCENARIO_SEED).expect("scenario seed");
    seed::import_into_postgres(pool, &scenario).await.expect("import scenario");
    Arc::new(PgStore::new(pool.clone()))
}

fn pg_engine(store: &Arc<PgStore>) -> ExamEngine {
    ExamEngine::new(store.clone(), store.clone(), AnswerCodec::default())
}

fn new_submission(id: &str, user_id: &str) -> NewSubmission {
    NewSubmission {
        id: id.to_string(),
        exam_paper_id: "p-mixed".to_string(),
        user_id: user_id.to_string(),
        start_time: primitive_now_utc(),
    }
}

fn always_allow(_: &[ExamPaperSubmission]) -> Result<(), RetakeDenial> {
    Ok(())
}

fn no_marks(_: &ExamPaperSubmission, _: &[ExamPaperQuestionAnswer]) -> GradeSheet {
    GradeSheet { grades: Vec::new(), summary: ScoreSummary { total_score: 0, passed: false } }
}

#[tokio::test]
async fn seed_import_keeps_choice_ids_per_question() {
    let _guard = env_lock().await;
    let Some(pool) = test_pg_pool().await else {
        eprintln!("DATABASE_URL is not set; skipping Postgres store test");
        return;
    };

    let shared = seed::parse(SHARED_CHOICE_IDS).expect("seed");
    seed::import_into_postgres(&pool, &shared).await.expect("first import");
    let summary = seed::import_into_postgres(&pool, &shared).await.expect("repeat import");
    assert_eq!(summary, seed::ImportSummary { questions: 2, papers: 1 });

    let store = PgStore::new(pool.clone());
    let first = store.get_question("q-first").await.unwrap().expect("q-first");
    let second = store.get_question("q-second").await.unwrap().expect("q-second");
    assert_eq!(first.correct_choice_ids().into_iter().collect::<Vec<_>>(), vec!["A"]);
    assert_eq!(second.correct_choice_ids().into_iter().collect::<Vec<_>>(), vec!["B"]);

    let paper = store.get_exam_paper("p-shared").await.unwrap().expect("paper");
    let slots: Vec<&str> = paper.questions.iter().map(|slot| slot.id.as_str()).collect();
    assert_eq!(slots, vec!["shared-1", "shared-2"]);
}

#[tokio::test]
async fn concurrent_starts_open_one_attempt() {
    let _guard = env_lock().await;
    let Some(pool) = test_pg_pool().await else {
        eprintln!("DATABASE_URL is not set; skipping Postgres store test");
        return;
    };
    let store = seeded_pg_store(&pool).await;
    let engine = pg_engine(&store);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move { engine.start_attempt("p-retake", "kim").await }));
    }

    let mut started = 0;
    let mut denied = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => started += 1,
            Err(EngineError::RetakeDenied(RetakeDenial::NoPriorAttemptAllowedWhileInProgress)) => {
                denied += 1
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!((started, denied), (1, 7));
    assert_eq!(store.list_submissions("p-retake", "kim").await.unwrap().len(), 1);
}

#[tokio::test]
async fn open_attempt_index_denies_second_insert() {
    let _guard = env_lock().await;
    let Some(pool) = test_pg_pool().await else {
        eprintln!("DATABASE_URL is not set; skipping Postgres store test");
        return;
    };
    let store = seeded_pg_store(&pool).await;

    let first = store.create_attempt(new_submission("s-1", "lee"), &always_allow).await.unwrap();
    assert!(matches!(first, AttemptOutcome::Created { prior_attempts: 0, .. }));

    let second = store.create_attempt(new_submission("s-2", "lee"), &always_allow).await.unwrap();
    assert_eq!(
        second,
        AttemptOutcome::Denied(RetakeDenial::NoPriorAttemptAllowedWhileInProgress)
    );
    assert_eq!(store.list_submissions("p-mixed", "lee").await.unwrap().len(), 1);
}

#[tokio::test]
async fn finalize_grades_and_closes_once() {
    let _guard = env_lock().await;
    let Some(pool) = test_pg_pool().await else {
        eprintln!("DATABASE_URL is not set; skipping Postgres store test");
        return;
    };
    let store = seeded_pg_store(&pool).await;
    let engine = pg_engine(&store);

    let started = engine.start_attempt("p-mixed", "alice").await.expect("start");
    let id = started.submission.id.as_str();
    engine.submit_answer(id, "slot-choice", CHOICE_B).await.expect("choice");
    engine.submit_answer(id, "slot-fill", FILL_PARIS).await.expect("fill");

    let result = engine.finalize(id).await.expect("finalize");
    assert_eq!(result.summary, ScoreSummary { total_score: 15, passed: true });

    let stored = store.get_submission(id).await.unwrap().expect("submission");
    assert_eq!(stored.total_score, 15);
    assert_eq!(stored.passed, Some(true));
    let submitted_at = stored.submission_time.expect("submission time");
    assert!(submitted_at >= stored.start_time);

    let answers = store.list_answers(id).await.unwrap();
    assert_eq!(answers.len(), 2);
    assert!(answers.iter().all(|answer| answer.is_correct));
    assert_eq!(answers.iter().map(|answer| answer.obtained_score).sum::<i32>(), 15);

    let again = store.finalize(id, primitive_now_utc(), &no_marks).await.unwrap();
    assert!(again.is_none());
    let unchanged = store.get_submission(id).await.unwrap().expect("submission");
    assert_eq!(unchanged, stored);
}

#[tokio::test]
async fn answers_after_finalize_are_refused() {
    let _guard = env_lock().await;
    let Some(pool) = test_pg_pool().await else {
        eprintln!("DATABASE_URL is not set; skipping Postgres store test");
        return;
    };
    let store = seeded_pg_store(&pool).await;

    store.create_attempt(new_submission("s-closed", "max"), &always_allow).await.unwrap();
    store.finalize("s-closed", primitive_now_utc(), &no_marks).await.unwrap().expect("graded");

    let late = store
        .upsert_answer(NewAnswer {
            id: "late".to_string(),
            submission_id: "s-closed".to_string(),
            paper_question_id: "slot-choice".to_string(),
            answer_content: CHOICE_B.to_string(),
            now: primitive_now_utc(),
        })
        .await
        .unwrap();
    assert!(late.is_none());
    assert!(store.list_answers("s-closed").await.unwrap().is_empty());
}

#[tokio::test]
async fn submission_time_is_clamped_to_start() {
    let _guard = env_lock().await;
    let Some(pool) = test_pg_pool().await else {
        eprintln!("DATABASE_URL is not set; skipping Postgres store test");
        return;
    };
    let store = seeded_pg_store(&pool).await;

    let created =
        match store.create_attempt(new_submission("s-skew", "nia"), &always_allow).await.unwrap() {
            AttemptOutcome::Created { submission, .. } => submission,
            AttemptOutcome::Denied(denial) => panic!("unexpected denial: {denial}"),
        };

    let early = created.start_time - Duration::hours(1);
    let finalized = store.finalize("s-skew", early, &no_marks).await.unwrap().expect("graded");
    assert_eq!(finalized.submission.submission_time, Some(created.start_time));
    assert_eq!(finalized.submission.passed, Some(false));
}
