use crate::db::models::{ExamPaperQuestionAnswer, ANSWER_COLUMNS};
use crate::repositories::NewAnswer;

pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    answer: &NewAnswer,
) -> Result<ExamPaperQuestionAnswer, sqlx::Error> {
    sqlx::query_as::<_, ExamPaperQuestionAnswer>(&format!(
        "INSERT INTO exam_paper_question_answers (
            id, exam_paper_question_id, exam_paper_submission_id, answer_content,
            is_correct, obtained_score, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,FALSE,0,$5,$5)
         ON CONFLICT (exam_paper_submission_id, exam_paper_question_id) DO UPDATE SET
            answer_content = EXCLUDED.answer_content,
            updated_at = EXCLUDED.updated_at
         RETURNING {ANSWER_COLUMNS}"
    ))
    .bind(&answer.id)
    .bind(&answer.paper_question_id)
    .bind(&answer.submission_id)
    .bind(&answer.answer_content)
    .bind(answer.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_by_submission(
    executor: impl sqlx::PgExecutor<'_>,
    submission_id: &str,
) -> Result<Vec<ExamPaperQuestionAnswer>, sqlx::Error> {
    sqlx::query_as::<_, ExamPaperQuestionAnswer>(&format!(
        "SELECT {ANSWER_COLUMNS}
         FROM exam_paper_question_answers
         WHERE exam_paper_submission_id = $1
         ORDER BY created_at, id"
    ))
    .bind(submission_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn record_grade(
    executor: impl sqlx::PgExecutor<'_>,
    answer_id: &str,
    is_correct: bool,
    obtained_score: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exam_paper_question_answers
         SET is_correct = $2, obtained_score = $3
         WHERE id = $1",
    )
    .bind(answer_id)
    .bind(is_correct)
    .bind(obtained_score)
    .execute(executor)
    .await?;

    Ok(())
}
