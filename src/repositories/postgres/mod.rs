mod answers;
mod papers;
mod questions;
mod submissions;
#[cfg(test)]
mod tests;

use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{ExamPaper, ExamPaperQuestionAnswer, ExamPaperSubmission, Question};
use crate::repositories::{
    AttemptGate, AttemptOutcome, FinalizedSubmission, Grader, NewAnswer, NewSubmission,
    QuestionBank, StoreError, SubmissionStore,
};
use crate::services::retake_policy::RetakeDenial;

pub(crate) use papers::{upsert as upsert_paper, upsert_question_slot};
pub(crate) use questions::upsert as upsert_question;

#[derive(Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_error) = &err {
        if matches!(db_error.code().as_deref(), Some("23505" | "40001" | "40P01")) {
            return StoreError::Conflict(db_error.message().to_string());
        }
    }
    StoreError::Database(err)
}

fn is_open_attempt_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_error) => {
            db_error.code().as_deref() == Some("23505")
                && db_error.constraint() == Some(submissions::OPEN_ATTEMPT_CONSTRAINT)
        }
        _ => false,
    }
}

#[async_trait]
impl QuestionBank for PgStore {
    async fn get_exam_paper(&self, id: &str) -> Result<Option<ExamPaper>, StoreError> {
        papers::find_by_id(&self.pool, id).await.map_err(classify)
    }

    async fn get_question(&self, id: &str) -> Result<Option<Question>, StoreError> {
        questions::find_by_id(&self.pool, id).await
    }
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn create_attempt(
        &self,
        submission: NewSubmission,
        gate: AttemptGate<'_>,
    ) -> Result<AttemptOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        submissions::lock_attempts(&mut *tx, &submission.exam_paper_id, &submission.user_id)
            .await
            .map_err(classify)?;
        let prior =
            submissions::list_for_user(&mut *tx, &submission.exam_paper_id, &submission.user_id)
                .await
                .map_err(classify)?;

        if let Err(denial) = gate(prior.as_slice()) {
            tx.rollback().await.map_err(classify)?;
            return Ok(AttemptOutcome::Denied(denial));
        }

        let created = match submissions::insert(&mut *tx, &submission).await {
            Ok(created) => created,
            Err(err) if is_open_attempt_violation(&err) => {
                return Ok(AttemptOutcome::Denied(
                    RetakeDenial::NoPriorAttemptAllowedWhileInProgress,
                ));
            }
            Err(err) => return Err(classify(err)),
        };
        tx.commit().await.map_err(classify)?;

        Ok(AttemptOutcome::Created { submission: created, prior_attempts: prior.len() })
    }

    async fn get_submission(&self, id: &str) -> Result<Option<ExamPaperSubmission>, StoreError> {
        submissions::find_by_id(&self.pool, id).await.map_err(classify)
    }

    async fn list_submissions(
        &self,
        paper_id: &str,
        user_id: &str,
    ) -> Result<Vec<ExamPaperSubmission>, StoreError> {
        submissions::list_for_user(&self.pool, paper_id, user_id).await.map_err(classify)
    }

    async fn list_answers(
        &self,
        submission_id: &str,
    ) -> Result<Vec<ExamPaperQuestionAnswer>, StoreError> {
        answers::list_by_submission(&self.pool, submission_id).await.map_err(classify)
    }

    async fn upsert_answer(
        &self,
        answer: NewAnswer,
    ) -> Result<Option<ExamPaperQuestionAnswer>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let open = submissions::find_for_share(&mut *tx, &answer.submission_id)
            .await
            .map_err(classify)?
            .is_some_and(|submission| submission.is_in_progress());
        if !open {
            tx.rollback().await.map_err(classify)?;
            return Ok(None);
        }

        let stored = answers::upsert(&mut *tx, &answer).await.map_err(classify)?;
        tx.commit().await.map_err(classify)?;
        Ok(Some(stored))
    }

    async fn finalize(
        &self,
        submission_id: &str,
        submission_time: PrimitiveDateTime,
        grader: Grader<'_>,
    ) -> Result<Option<FinalizedSubmission>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let submission =
            submissions::find_for_update(&mut *tx, submission_id).await.map_err(classify)?;
        let Some(submission) = submission.filter(ExamPaperSubmission::is_in_progress) else {
            tx.rollback().await.map_err(classify)?;
            return Ok(None);
        };

        let mut stored = answers::list_by_submission(&mut *tx, submission_id)
            .await
            .map_err(classify)?;
        let grades = grader(&submission, &stored);

        for answer in stored.iter_mut() {
            let grade = grades
                .grades
                .iter()
                .find(|grade| grade.answer_id == answer.id)
                .ok_or_else(|| {
                    StoreError::Integrity(format!("answer {} was not graded", answer.id))
                })?;
            answers::record_grade(&mut *tx, &answer.id, grade.is_correct, grade.obtained_score)
                .await
                .map_err(classify)?;
            answer.is_correct = grade.is_correct;
            answer.obtained_score = grade.obtained_score;
        }

        let graded = submissions::close(
            &mut *tx,
            submission_id,
            submission_time,
            grades.summary.total_score,
            grades.summary.passed,
        )
        .await
        .map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        Ok(Some(FinalizedSubmission { submission: graded, answers: stored, grades }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(classify)?;
        Ok(())
    }
}
