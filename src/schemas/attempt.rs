use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{ExamPaperSubmission, QuestionBody};
use crate::db::types::SubmissionStatus;
use crate::services::retake_policy::RetakeDenial;
use crate::services::submission_lifecycle::{AttemptHistory, ComposedQuestion, StartedAttempt};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StartAttemptRequest {
    #[validate(length(min = 1, max = 256, message = "user_id must be 1-256 characters"))]
    pub(crate) user_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ListAttemptsQuery {
    #[validate(length(min = 1, max = 256, message = "user_id must be 1-256 characters"))]
    pub(crate) user_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChoiceView {
    pub(crate) id: String,
    pub(crate) content: String,
}

/// Question as shown to the examinee. Never carries the answer key.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum QuestionPrompt {
    Choice { content: String, choices: Vec<ChoiceView> },
    FillInBlank { text_with_blanks: String },
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionView {
    pub(crate) paper_question_id: String,
    pub(crate) question_id: String,
    pub(crate) score: i32,
    #[serde(flatten)]
    pub(crate) prompt: QuestionPrompt,
}

impl QuestionView {
    pub(crate) fn from_composed(composed: ComposedQuestion) -> Self {
        let prompt = match composed.question.body {
            QuestionBody::Choice { content, choices } => QuestionPrompt::Choice {
                content,
                choices: choices
                    .into_iter()
                    .map(|choice| ChoiceView { id: choice.id, content: choice.content })
                    .collect(),
            },
            QuestionBody::FillInBlank { text_with_blanks, .. } => {
                QuestionPrompt::FillInBlank { text_with_blanks }
            }
        };

        Self {
            paper_question_id: composed.slot.id,
            question_id: composed.slot.question_id,
            score: composed.slot.score,
            prompt,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StartAttemptResponse {
    pub(crate) submission_id: String,
    pub(crate) exam_paper_id: String,
    pub(crate) user_id: String,
    pub(crate) attempt_number: usize,
    pub(crate) start_time: String,
    pub(crate) duration_minutes: i32,
    pub(crate) max_score: i32,
    pub(crate) passing_score: i32,
    pub(crate) questions: Vec<QuestionView>,
}

impl StartAttemptResponse {
    pub(crate) fn from_started(started: StartedAttempt) -> Self {
        Self {
            submission_id: started.submission.id,
            exam_paper_id: started.submission.exam_paper_id,
            user_id: started.submission.user_id,
            attempt_number: started.attempt_number,
            start_time: format_primitive(started.submission.start_time),
            duration_minutes: started.paper.duration_minutes,
            max_score: started.paper.max_score(),
            passing_score: started.paper.passing_score,
            questions: started.questions.into_iter().map(QuestionView::from_composed).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptSummary {
    pub(crate) submission_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) start_time: String,
    pub(crate) submission_time: Option<String>,
    pub(crate) total_score: Option<i32>,
}

impl AttemptSummary {
    pub(crate) fn from_db(submission: ExamPaperSubmission) -> Self {
        let status = submission.status();
        Self {
            submission_id: submission.id,
            status,
            start_time: format_primitive(submission.start_time),
            submission_time: submission.submission_time.map(format_primitive),
            total_score: submission.submission_time.map(|_| submission.total_score),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptListResponse {
    pub(crate) exam_paper_id: String,
    pub(crate) user_id: String,
    pub(crate) attempts: Vec<AttemptSummary>,
    pub(crate) can_start_attempt: bool,
    pub(crate) denial_reason: Option<RetakeDenial>,
    pub(crate) remaining_attempts: usize,
}

impl AttemptListResponse {
    pub(crate) fn from_history(user_id: String, history: AttemptHistory) -> Self {
        Self {
            exam_paper_id: history.paper.id,
            user_id,
            attempts: history.attempts.into_iter().map(AttemptSummary::from_db).collect(),
            can_start_attempt: history.eligibility.is_ok(),
            denial_reason: history.eligibility.err(),
            remaining_attempts: history.remaining_attempts,
        }
    }
}
