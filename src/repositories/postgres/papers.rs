use sqlx::PgPool;

use crate::db::models::{ExamPaper, ExamPaperQuestion, EXAM_PAPER_COLUMNS, PAPER_QUESTION_COLUMNS};

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<ExamPaper>, sqlx::Error> {
    let paper = sqlx::query_as::<_, ExamPaper>(&format!(
        "SELECT {EXAM_PAPER_COLUMNS} FROM exam_papers WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(mut paper) = paper else {
        return Ok(None);
    };
    paper.questions = list_questions(pool, &paper.id).await?;
    Ok(Some(paper))
}

pub(crate) async fn list_questions(
    executor: impl sqlx::PgExecutor<'_>,
    paper_id: &str,
) -> Result<Vec<ExamPaperQuestion>, sqlx::Error> {
    sqlx::query_as::<_, ExamPaperQuestion>(&format!(
        "SELECT {PAPER_QUESTION_COLUMNS}
         FROM exam_paper_questions
         WHERE exam_paper_id = $1
         ORDER BY order_index, id"
    ))
    .bind(paper_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    paper: &ExamPaper,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exam_papers (
            id, title, description, creation_time, duration_minutes, shuffle_questions,
            allow_retake, max_retake_count, passing_score
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
         ON CONFLICT (id) DO UPDATE SET
            title = EXCLUDED.title,
            description = EXCLUDED.description,
            duration_minutes = EXCLUDED.duration_minutes,
            shuffle_questions = EXCLUDED.shuffle_questions,
            allow_retake = EXCLUDED.allow_retake,
            max_retake_count = EXCLUDED.max_retake_count,
            passing_score = EXCLUDED.passing_score",
    )
    .bind(&paper.id)
    .bind(&paper.title)
    .bind(&paper.description)
    .bind(paper.creation_time)
    .bind(paper.duration_minutes)
    .bind(paper.shuffle_questions)
    .bind(paper.allow_retake)
    .bind(paper.max_retake_count)
    .bind(paper.passing_score)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn upsert_question_slot(
    executor: impl sqlx::PgExecutor<'_>,
    slot: &ExamPaperQuestion,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exam_paper_questions (id, exam_paper_id, question_id, order_index, score)
         VALUES ($1,$2,$3,$4,$5)
         ON CONFLICT (id) DO UPDATE SET
            question_id = EXCLUDED.question_id,
            order_index = EXCLUDED.order_index,
            score = EXCLUDED.score",
    )
    .bind(&slot.id)
    .bind(&slot.exam_paper_id)
    .bind(&slot.question_id)
    .bind(slot.order_index)
    .bind(slot.score)
    .execute(executor)
    .await?;

    Ok(())
}
