//! Question bank seeding from a JSON file.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use validator::Validate;

use crate::core::time::primitive_now_utc;
use crate::db::models::{
    Choice, ExamPaper, ExamPaperQuestion, Question, QuestionBody, DEFAULT_DURATION_MINUTES,
    DEFAULT_MAX_RETAKE_COUNT, DEFAULT_PASSING_SCORE, DEFAULT_QUESTION_SCORE,
};
use crate::db::types::QuestionKind;
use crate::repositories::{postgres, MemoryStore};

#[derive(Debug, Clone)]
pub(crate) struct Seed {
    pub(crate) questions: Vec<Question>,
    pub(crate) papers: Vec<ExamPaper>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ImportSummary {
    pub(crate) questions: usize,
    pub(crate) papers: usize,
}

#[derive(Debug, Deserialize, Validate)]
struct SeedFile {
    #[serde(default)]
    #[validate(nested)]
    questions: Vec<SeedQuestion>,
    #[serde(default)]
    #[validate(nested)]
    papers: Vec<SeedPaper>,
}

#[derive(Debug, Deserialize, Validate)]
struct SeedQuestion {
    #[validate(length(min = 1, max = 64, message = "question id must be 1-64 characters"))]
    id: String,
    kind: QuestionKind,
    #[validate(length(max = 4096, message = "content must be at most 4096 characters"))]
    content: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    choices: Vec<SeedChoice>,
    #[validate(length(max = 8192, message = "text_with_blanks must be at most 8192 characters"))]
    text_with_blanks: Option<String>,
    #[validate(length(max = 1024, message = "answer must be at most 1024 characters"))]
    answer: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct SeedChoice {
    #[validate(length(min = 1, max = 64, message = "choice id must be 1-64 characters"))]
    id: String,
    #[validate(length(max = 2048, message = "choice content must be at most 2048 characters"))]
    content: String,
    #[serde(default)]
    is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
struct SeedPaper {
    #[validate(length(min = 1, max = 64, message = "paper id must be 1-64 characters"))]
    id: String,
    #[validate(length(min = 1, max = 256, message = "title must be 1-256 characters"))]
    title: String,
    #[serde(default)]
    #[validate(length(max = 4096, message = "description must be at most 4096 characters"))]
    description: Option<String>,
    #[serde(default = "default_duration")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    duration_minutes: i32,
    #[serde(default)]
    shuffle_questions: bool,
    #[serde(default)]
    allow_retake: bool,
    #[serde(default = "default_max_retake_count")]
    #[validate(range(min = 0, message = "max_retake_count must be non-negative"))]
    max_retake_count: i32,
    #[serde(default = "default_passing_score")]
    passing_score: i32,
    #[serde(default)]
    #[validate(nested)]
    questions: Vec<SeedSlot>,
}

#[derive(Debug, Deserialize, Validate)]
struct SeedSlot {
    #[validate(length(min = 1, max = 64, message = "slot id must be 1-64 characters"))]
    id: String,
    question_id: String,
    #[serde(default)]
    #[validate(range(min = 0, message = "order_index must be non-negative"))]
    order_index: i32,
    #[serde(default = "default_question_score")]
    #[validate(range(min = 0, message = "score must be non-negative"))]
    score: i32,
}

fn default_duration() -> i32 {
    DEFAULT_DURATION_MINUTES
}

fn default_max_retake_count() -> i32 {
    DEFAULT_MAX_RETAKE_COUNT
}

fn default_passing_score() -> i32 {
    DEFAULT_PASSING_SCORE
}

fn default_question_score() -> i32 {
    DEFAULT_QUESTION_SCORE
}

pub(crate) async fn load(path: &Path) -> anyhow::Result<Seed> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read question bank seed: {}", path.display()))?;
    parse(&raw).with_context(|| format!("invalid question bank seed: {}", path.display()))
}

pub(crate) fn parse(raw: &str) -> anyhow::Result<Seed> {
    let file: SeedFile = serde_json::from_str(raw).context("seed json has invalid format")?;
    file.validate().map_err(|err| anyhow!("seed validation failed: {err}"))?;

    let now = primitive_now_utc();
    let mut question_ids = HashSet::new();
    let mut questions = Vec::with_capacity(file.questions.len());
    for raw_question in file.questions {
        if !question_ids.insert(raw_question.id.clone()) {
            bail!("duplicate question id {}", raw_question.id);
        }
        questions.push(into_question(raw_question, now)?);
    }

    let mut paper_ids = HashSet::new();
    let mut slot_ids = HashSet::new();
    let mut papers = Vec::with_capacity(file.papers.len());
    for raw_paper in file.papers {
        if !paper_ids.insert(raw_paper.id.clone()) {
            bail!("duplicate paper id {}", raw_paper.id);
        }

        let mut slots = Vec::with_capacity(raw_paper.questions.len());
        for slot in raw_paper.questions {
            if !question_ids.contains(&slot.question_id) {
                bail!("paper {} refers to unknown question {}", raw_paper.id, slot.question_id);
            }
            if !slot_ids.insert(slot.id.clone()) {
                bail!("duplicate paper question id {}", slot.id);
            }
            slots.push(ExamPaperQuestion {
                id: slot.id,
                exam_paper_id: raw_paper.id.clone(),
                question_id: slot.question_id,
                order_index: slot.order_index,
                score: slot.score,
            });
        }

        papers.push(ExamPaper {
            id: raw_paper.id,
            title: raw_paper.title,
            description: raw_paper.description,
            creation_time: now,
            duration_minutes: raw_paper.duration_minutes,
            shuffle_questions: raw_paper.shuffle_questions,
            allow_retake: raw_paper.allow_retake,
            max_retake_count: raw_paper.max_retake_count,
            passing_score: raw_paper.passing_score,
            questions: slots,
        });
    }

    Ok(Seed { questions, papers })
}

fn into_question(raw: SeedQuestion, now: time::PrimitiveDateTime) -> anyhow::Result<Question> {
    let body = match raw.kind {
        QuestionKind::Choice => {
            let content =
                raw.content.ok_or_else(|| anyhow!("choice question {} has no content", raw.id))?;
            if raw.choices.is_empty() {
                bail!("choice question {} has no choices", raw.id);
            }
            if !raw.choices.iter().any(|choice| choice.is_correct) {
                bail!("choice question {} has no correct choice", raw.id);
            }
            let mut seen = HashSet::new();
            let mut choices = Vec::with_capacity(raw.choices.len());
            for choice in raw.choices {
                if !seen.insert(choice.id.clone()) {
                    bail!("choice question {} repeats choice id {}", raw.id, choice.id);
                }
                choices.push(Choice {
                    id: choice.id,
                    question_id: raw.id.clone(),
                    content: choice.content,
                    is_correct: choice.is_correct,
                });
            }
            QuestionBody::Choice { content, choices }
        }
        QuestionKind::FillInBlank => QuestionBody::FillInBlank {
            text_with_blanks: raw
                .text_with_blanks
                .ok_or_else(|| anyhow!("fill-in-blank question {} has no text", raw.id))?,
            answer: raw
                .answer
                .ok_or_else(|| anyhow!("fill-in-blank question {} has no answer", raw.id))?,
        },
    };

    Ok(Question { id: raw.id, creation_time: now, body })
}

pub(crate) async fn apply_to_memory(store: &MemoryStore, seed: Seed) -> ImportSummary {
    let summary = ImportSummary { questions: seed.questions.len(), papers: seed.papers.len() };
    for question in seed.questions {
        store.insert_question(question).await;
    }
    for paper in seed.papers {
        store.insert_paper(paper).await;
    }
    summary
}

pub(crate) async fn import_into_postgres(
    pool: &sqlx::PgPool,
    seed: &Seed,
) -> anyhow::Result<ImportSummary> {
    let mut tx = pool.begin().await.context("failed to begin seed transaction")?;

    for question in &seed.questions {
        postgres::upsert_question(&mut *tx, question)
            .await
            .with_context(|| format!("failed to upsert question {}", question.id))?;
    }
    for paper in &seed.papers {
        postgres::upsert_paper(&mut *tx, paper)
            .await
            .with_context(|| format!("failed to upsert paper {}", paper.id))?;
        for slot in &paper.questions {
            postgres::upsert_question_slot(&mut *tx, slot)
                .await
                .with_context(|| format!("failed to upsert paper question {}", slot.id))?;
        }
    }

    tx.commit().await.context("failed to commit seed transaction")?;
    Ok(ImportSummary { questions: seed.questions.len(), papers: seed.papers.len() })
}
