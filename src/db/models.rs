use std::collections::BTreeSet;

use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{QuestionKind, SubmissionStatus};

pub const DEFAULT_DURATION_MINUTES: i32 = 60;
pub const DEFAULT_MAX_RETAKE_COUNT: i32 = 5;
pub const DEFAULT_PASSING_SCORE: i32 = 80;
pub const DEFAULT_QUESTION_SCORE: i32 = 5;

pub(crate) const EXAM_PAPER_COLUMNS: &str = "\
    id, title, description, creation_time, duration_minutes, shuffle_questions, \
    allow_retake, max_retake_count, passing_score";

pub(crate) const PAPER_QUESTION_COLUMNS: &str =
    "id, exam_paper_id, question_id, order_index, score";

pub(crate) const QUESTION_COLUMNS: &str =
    "id, kind, creation_time, content, text_with_blanks, answer";

pub(crate) const CHOICE_COLUMNS: &str = "id, question_id, content, is_correct";

pub(crate) const SUBMISSION_COLUMNS: &str =
    "id, exam_paper_id, user_id, start_time, submission_time, total_score, passed";

pub(crate) const ANSWER_COLUMNS: &str = "\
    id, exam_paper_question_id, exam_paper_submission_id, answer_content, is_correct, \
    obtained_score, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct ExamPaper {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub creation_time: PrimitiveDateTime,
    pub duration_minutes: i32,
    pub shuffle_questions: bool,
    pub allow_retake: bool,
    pub max_retake_count: i32,
    pub passing_score: i32,
    /// Loaded separately from `exam_paper_questions`.
    #[sqlx(skip)]
    pub questions: Vec<ExamPaperQuestion>,
}

impl ExamPaper {
    pub fn find_question(&self, paper_question_id: &str) -> Option<&ExamPaperQuestion> {
        self.questions.iter().find(|question| question.id == paper_question_id)
    }

    pub fn max_score(&self) -> i32 {
        self.questions.iter().fold(0i32, |acc, question| acc.saturating_add(question.score))
    }
}

/// A question's placement within one paper, with the points it is worth there.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ExamPaperQuestion {
    pub id: String,
    pub exam_paper_id: String,
    pub question_id: String,
    pub order_index: i32,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Choice {
    pub id: String,
    pub question_id: String,
    pub content: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionBody {
    Choice { content: String, choices: Vec<Choice> },
    FillInBlank { text_with_blanks: String, answer: String },
}

impl QuestionBody {
    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionBody::Choice { .. } => QuestionKind::Choice,
            QuestionBody::FillInBlank { .. } => QuestionKind::FillInBlank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub creation_time: PrimitiveDateTime,
    pub body: QuestionBody,
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        self.body.kind()
    }

    /// Ids of the choices flagged correct. Empty for fill-in-blank questions.
    pub fn correct_choice_ids(&self) -> BTreeSet<&str> {
        match &self.body {
            QuestionBody::Choice { choices, .. } => choices
                .iter()
                .filter(|choice| choice.is_correct)
                .map(|choice| choice.id.as_str())
                .collect(),
            QuestionBody::FillInBlank { .. } => BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct QuestionRow {
    pub(crate) id: String,
    pub(crate) kind: QuestionKind,
    pub(crate) creation_time: PrimitiveDateTime,
    pub(crate) content: Option<String>,
    pub(crate) text_with_blanks: Option<String>,
    pub(crate) answer: Option<String>,
}

impl QuestionRow {
    pub(crate) fn into_question(self, choices: Vec<Choice>) -> Result<Question, String> {
        let body = match self.kind {
            QuestionKind::Choice => QuestionBody::Choice {
                content: self
                    .content
                    .ok_or_else(|| format!("choice question {} has no content", self.id))?,
                choices,
            },
            QuestionKind::FillInBlank => QuestionBody::FillInBlank {
                text_with_blanks: self.text_with_blanks.ok_or_else(|| {
                    format!("fill-in-blank question {} has no text", self.id)
                })?,
                answer: self
                    .answer
                    .ok_or_else(|| format!("fill-in-blank question {} has no answer", self.id))?,
            },
        };

        Ok(Question { id: self.id, creation_time: self.creation_time, body })
    }
}

/// One attempt by one user against one paper.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ExamPaperSubmission {
    pub id: String,
    pub exam_paper_id: String,
    pub user_id: String,
    pub start_time: PrimitiveDateTime,
    /// `None` while the attempt is in progress.
    pub submission_time: Option<PrimitiveDateTime>,
    pub total_score: i32,
    /// Verdict fixed at grading time. `None` while the attempt is in progress.
    pub passed: Option<bool>,
}

impl ExamPaperSubmission {
    pub fn status(&self) -> SubmissionStatus {
        if self.submission_time.is_some() {
            SubmissionStatus::Graded
        } else {
            SubmissionStatus::InProgress
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.submission_time.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ExamPaperQuestionAnswer {
    pub id: String,
    pub exam_paper_question_id: String,
    pub exam_paper_submission_id: String,
    pub answer_content: String,
    pub is_correct: bool,
    pub obtained_score: i32,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}
