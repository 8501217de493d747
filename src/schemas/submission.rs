use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::ExamPaperQuestionAnswer;
use crate::db::types::SubmissionStatus;
use crate::services::answer_codec::AnswerContent;
use crate::services::submission_lifecycle::{FinalizeResult, SubmissionState, SubmittedAnswer};

#[derive(Debug, Serialize)]
pub(crate) struct SubmitAnswerResponse {
    pub(crate) answer_id: String,
    pub(crate) submission_id: String,
    pub(crate) paper_question_id: String,
    pub(crate) content: AnswerContent,
    pub(crate) updated_at: String,
}

impl SubmitAnswerResponse {
    pub(crate) fn from_submitted(submitted: SubmittedAnswer) -> Self {
        Self {
            answer_id: submitted.answer.id,
            submission_id: submitted.answer.exam_paper_submission_id,
            paper_question_id: submitted.answer.exam_paper_question_id,
            content: submitted.content,
            updated_at: format_primitive(submitted.answer.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerView {
    pub(crate) answer_id: String,
    pub(crate) paper_question_id: String,
    pub(crate) answer_content: serde_json::Value,
    pub(crate) is_correct: Option<bool>,
    pub(crate) obtained_score: Option<i32>,
    pub(crate) updated_at: String,
}

impl AnswerView {
    /// Grades are shown only when `graded` is set.
    pub(crate) fn from_db(answer: ExamPaperQuestionAnswer, graded: bool) -> Self {
        let answer_content = serde_json::from_str(&answer.answer_content)
            .unwrap_or(serde_json::Value::String(answer.answer_content));
        Self {
            answer_id: answer.id,
            paper_question_id: answer.exam_paper_question_id,
            answer_content,
            is_correct: graded.then_some(answer.is_correct),
            obtained_score: graded.then_some(answer.obtained_score),
            updated_at: format_primitive(answer.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct FinalizeResponse {
    pub(crate) submission_id: String,
    pub(crate) total_score: i32,
    pub(crate) max_score: i32,
    pub(crate) passed: bool,
    pub(crate) submission_time: Option<String>,
    pub(crate) answers: Vec<AnswerView>,
}

impl FinalizeResponse {
    pub(crate) fn from_result(result: FinalizeResult) -> Self {
        Self {
            submission_id: result.submission.id,
            total_score: result.summary.total_score,
            max_score: result.max_score,
            passed: result.summary.passed,
            submission_time: result.submission.submission_time.map(format_primitive),
            answers: result.answers.into_iter().map(|answer| AnswerView::from_db(answer, true)).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionStateResponse {
    pub(crate) id: String,
    pub(crate) exam_paper_id: String,
    pub(crate) paper_title: String,
    pub(crate) user_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) start_time: String,
    pub(crate) submission_time: Option<String>,
    pub(crate) total_score: Option<i32>,
    pub(crate) max_score: i32,
    pub(crate) passing_score: i32,
    pub(crate) passed: Option<bool>,
    pub(crate) answers: Vec<AnswerView>,
}

impl SubmissionStateResponse {
    pub(crate) fn from_state(state: SubmissionState) -> Self {
        let status = state.submission.status();
        let graded = status == SubmissionStatus::Graded;
        Self {
            id: state.submission.id,
            exam_paper_id: state.submission.exam_paper_id,
            paper_title: state.paper.title.clone(),
            user_id: state.submission.user_id,
            status,
            start_time: format_primitive(state.submission.start_time),
            submission_time: state.submission.submission_time.map(format_primitive),
            total_score: graded.then_some(state.submission.total_score),
            max_score: state.paper.max_score(),
            passing_score: state.paper.passing_score,
            passed: state.passed,
            answers: state
                .answers
                .into_iter()
                .map(|answer| AnswerView::from_db(answer, graded))
                .collect(),
        }
    }
}
