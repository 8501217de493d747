//! Persistence boundary for the engine.
//!
//! Two backends implement the same traits: `postgres` for deployments and `memory`
//! for tests and the in-memory database type. Both serialize attempt creation per
//! (paper, user) and apply grading atomically with the status change.

use async_trait::async_trait;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{ExamPaper, ExamPaperQuestionAnswer, ExamPaperSubmission, Question};
use crate::services::grading::GradeSheet;
use crate::services::retake_policy::RetakeDenial;

pub(crate) mod memory;
pub(crate) mod postgres;
pub(crate) mod seed;

pub(crate) use memory::MemoryStore;
pub(crate) use postgres::PgStore;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("concurrent update conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("stored data is inconsistent: {0}")]
    Integrity(String),
}

/// Retake check run by the store while it holds the (paper, user) lock.
pub(crate) type AttemptGate<'a> =
    &'a (dyn Fn(&[ExamPaperSubmission]) -> Result<(), RetakeDenial> + Send + Sync);

/// Grades the locked submission's answers. Runs inside the finalize transaction.
pub(crate) type Grader<'a> =
    &'a (dyn Fn(&ExamPaperSubmission, &[ExamPaperQuestionAnswer]) -> GradeSheet + Send + Sync);

#[derive(Debug, Clone)]
pub(crate) struct NewSubmission {
    pub(crate) id: String,
    pub(crate) exam_paper_id: String,
    pub(crate) user_id: String,
    pub(crate) start_time: PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub(crate) struct NewAnswer {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) paper_question_id: String,
    pub(crate) answer_content: String,
    pub(crate) now: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttemptOutcome {
    Created { submission: ExamPaperSubmission, prior_attempts: usize },
    Denied(RetakeDenial),
}

#[derive(Debug, Clone)]
pub(crate) struct FinalizedSubmission {
    pub(crate) submission: ExamPaperSubmission,
    pub(crate) answers: Vec<ExamPaperQuestionAnswer>,
    pub(crate) grades: GradeSheet,
}

#[async_trait]
pub(crate) trait QuestionBank: Send + Sync {
    /// Paper with its question slots loaded.
    async fn get_exam_paper(&self, id: &str) -> Result<Option<ExamPaper>, StoreError>;

    async fn get_question(&self, id: &str) -> Result<Option<Question>, StoreError>;
}

#[async_trait]
pub(crate) trait SubmissionStore: Send + Sync {
    async fn create_attempt(
        &self,
        submission: NewSubmission,
        gate: AttemptGate<'_>,
    ) -> Result<AttemptOutcome, StoreError>;

    async fn get_submission(&self, id: &str) -> Result<Option<ExamPaperSubmission>, StoreError>;

    /// All submissions of `user_id` for `paper_id`, oldest first.
    async fn list_submissions(
        &self,
        paper_id: &str,
        user_id: &str,
    ) -> Result<Vec<ExamPaperSubmission>, StoreError>;

    async fn list_answers(
        &self,
        submission_id: &str,
    ) -> Result<Vec<ExamPaperQuestionAnswer>, StoreError>;

    /// Inserts or replaces the answer for one slot.
    ///
    /// Returns `None` when the submission is missing or no longer in progress.
    async fn upsert_answer(
        &self,
        answer: NewAnswer,
    ) -> Result<Option<ExamPaperQuestionAnswer>, StoreError>;

    /// Grades and closes an in-progress submission in one step.
    ///
    /// Returns `None` when the submission is missing or already graded.
    async fn finalize(
        &self,
        submission_id: &str,
        submission_time: PrimitiveDateTime,
        grader: Grader<'_>,
    ) -> Result<Option<FinalizedSubmission>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
