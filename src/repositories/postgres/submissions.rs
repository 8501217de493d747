use time::PrimitiveDateTime;

use crate::db::models::{ExamPaperSubmission, SUBMISSION_COLUMNS};
use crate::repositories::NewSubmission;

pub(crate) const OPEN_ATTEMPT_CONSTRAINT: &str = "ux_exam_paper_submissions_open_attempt";

/// Serializes attempt creation for one (paper, user) until the transaction ends.
pub(crate) async fn lock_attempts(
    executor: impl sqlx::PgExecutor<'_>,
    paper_id: &str,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("{paper_id}:{user_id}"))
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn list_for_user(
    executor: impl sqlx::PgExecutor<'_>,
    paper_id: &str,
    user_id: &str,
) -> Result<Vec<ExamPaperSubmission>, sqlx::Error> {
    sqlx::query_as::<_, ExamPaperSubmission>(&format!(
        "SELECT {SUBMISSION_COLUMNS}
         FROM exam_paper_submissions
         WHERE exam_paper_id = $1 AND user_id = $2
         ORDER BY start_time, id"
    ))
    .bind(paper_id)
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    submission: &NewSubmission,
) -> Result<ExamPaperSubmission, sqlx::Error> {
    sqlx::query_as::<_, ExamPaperSubmission>(&format!(
        "INSERT INTO exam_paper_submissions (id, exam_paper_id, user_id, start_time, total_score)
         VALUES ($1,$2,$3,$4,0)
         RETURNING {SUBMISSION_COLUMNS}"
    ))
    .bind(&submission.id)
    .bind(&submission.exam_paper_id)
    .bind(&submission.user_id)
    .bind(submission.start_time)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamPaperSubmission>, sqlx::Error> {
    sqlx::query_as::<_, ExamPaperSubmission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM exam_paper_submissions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_for_share(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamPaperSubmission>, sqlx::Error> {
    sqlx::query_as::<_, ExamPaperSubmission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM exam_paper_submissions WHERE id = $1 FOR SHARE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_for_update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamPaperSubmission>, sqlx::Error> {
    sqlx::query_as::<_, ExamPaperSubmission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM exam_paper_submissions WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn close(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    submission_time: PrimitiveDateTime,
    total_score: i32,
    passed: bool,
) -> Result<ExamPaperSubmission, sqlx::Error> {
    sqlx::query_as::<_, ExamPaperSubmission>(&format!(
        "UPDATE exam_paper_submissions
         SET submission_time = GREATEST($2, start_time),
             total_score = $3,
             passed = $4
         WHERE id = $1 AND submission_time IS NULL
         RETURNING {SUBMISSION_COLUMNS}"
    ))
    .bind(id)
    .bind(submission_time)
    .bind(total_score)
    .bind(passed)
    .fetch_one(executor)
    .await
}
