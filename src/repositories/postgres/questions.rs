use sqlx::PgPool;

use crate::db::models::{Choice, Question, QuestionBody, QuestionRow, CHOICE_COLUMNS, QUESTION_COLUMNS};
use crate::repositories::StoreError;

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Question>, StoreError> {
    let row = sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let choices = list_choices(pool, id).await?;
    row.into_question(choices).map(Some).map_err(StoreError::Integrity)
}

async fn list_choices(pool: &PgPool, question_id: &str) -> Result<Vec<Choice>, sqlx::Error> {
    sqlx::query_as::<_, Choice>(&format!(
        "SELECT {CHOICE_COLUMNS} FROM choices WHERE question_id = $1 ORDER BY order_index, id"
    ))
    .bind(question_id)
    .fetch_all(pool)
    .await
}

/// Writes the question and replaces its choice list.
pub(crate) async fn upsert(
    conn: &mut sqlx::PgConnection,
    question: &Question,
) -> Result<(), sqlx::Error> {
    let (content, text_with_blanks, answer) = match &question.body {
        QuestionBody::Choice { content, .. } => (Some(content.as_str()), None, None),
        QuestionBody::FillInBlank { text_with_blanks, answer } => {
            (None, Some(text_with_blanks.as_str()), Some(answer.as_str()))
        }
    };

    sqlx::query(
        "INSERT INTO questions (id, kind, creation_time, content, text_with_blanks, answer)
         VALUES ($1,$2,$3,$4,$5,$6)
         ON CONFLICT (id) DO UPDATE SET
            kind = EXCLUDED.kind,
            content = EXCLUDED.content,
            text_with_blanks = EXCLUDED.text_with_blanks,
            answer = EXCLUDED.answer",
    )
    .bind(&question.id)
    .bind(question.kind())
    .bind(question.creation_time)
    .bind(content)
    .bind(text_with_blanks)
    .bind(answer)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM choices WHERE question_id = $1")
        .bind(&question.id)
        .execute(&mut *conn)
        .await?;

    if let QuestionBody::Choice { choices, .. } = &question.body {
        for (order_index, choice) in choices.iter().enumerate() {
            sqlx::query(
                "INSERT INTO choices (id, question_id, content, is_correct, order_index)
                 VALUES ($1,$2,$3,$4,$5)",
            )
            .bind(&choice.id)
            .bind(&question.id)
            .bind(&choice.content)
            .bind(choice.is_correct)
            .bind(order_index as i32)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}
