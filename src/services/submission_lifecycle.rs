//! Attempt lifecycle: start, answer, finalize.
//!
//! A submission is `InProgress` from `start_attempt` until `finalize` grades it and
//! records the submission time; after that it is `Graded` for good. Atomicity of
//! attempt creation and grading is delegated to the [`SubmissionStore`].

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use uuid::Uuid;

use crate::core::metrics;
use crate::core::time::primitive_now_utc;
use crate::db::models::{
    ExamPaper, ExamPaperQuestion, ExamPaperQuestionAnswer, ExamPaperSubmission, Question,
};
use crate::repositories::{
    AttemptOutcome, NewAnswer, NewSubmission, QuestionBank, StoreError, SubmissionStore,
};
use crate::services::answer_codec::{AnswerCodec, AnswerContent};
use crate::services::exam_composer;
use crate::services::grading;
use crate::services::retake_policy::{self, RetakeDenial};
use crate::services::score_aggregator::ScoreSummary;

#[derive(Debug, Error)]
pub(crate) enum EngineError {
    #[error("attempt denied: {0}")]
    RetakeDenied(RetakeDenial),
    #[error("malformed answer: {0}")]
    MalformedAnswer(String),
    #[error("question is not part of this exam paper")]
    QuestionNotInPaper,
    #[error("submission is not in progress")]
    SubmissionNotInProgress,
    #[error("submission not found")]
    SubmissionNotFound,
    #[error("exam paper not found")]
    PaperNotFound,
    #[error("question {0} not found")]
    QuestionNotFound(String),
    #[error("storage conflict: {0}")]
    StorageConflict(String),
    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => EngineError::StorageConflict(message),
            other => EngineError::Storage(other),
        }
    }
}

/// A paper slot together with the question it points at.
#[derive(Debug, Clone)]
pub(crate) struct ComposedQuestion {
    pub(crate) slot: ExamPaperQuestion,
    pub(crate) question: Question,
}

#[derive(Debug, Clone)]
pub(crate) struct StartedAttempt {
    pub(crate) submission: ExamPaperSubmission,
    pub(crate) attempt_number: usize,
    pub(crate) paper: ExamPaper,
    pub(crate) questions: Vec<ComposedQuestion>,
}

#[derive(Debug, Clone)]
pub(crate) struct SubmittedAnswer {
    pub(crate) answer: ExamPaperQuestionAnswer,
    pub(crate) content: AnswerContent,
}

#[derive(Debug, Clone)]
pub(crate) struct FinalizeResult {
    pub(crate) submission: ExamPaperSubmission,
    pub(crate) answers: Vec<ExamPaperQuestionAnswer>,
    pub(crate) summary: ScoreSummary,
    pub(crate) max_score: i32,
}

#[derive(Debug, Clone)]
pub(crate) struct SubmissionState {
    pub(crate) submission: ExamPaperSubmission,
    pub(crate) paper: ExamPaper,
    pub(crate) answers: Vec<ExamPaperQuestionAnswer>,
    /// Set only once the submission is graded.
    pub(crate) passed: Option<bool>,
}

#[derive(Debug, Clone)]
pub(crate) struct AttemptHistory {
    pub(crate) paper: ExamPaper,
    pub(crate) attempts: Vec<ExamPaperSubmission>,
    pub(crate) eligibility: Result<(), RetakeDenial>,
    pub(crate) remaining_attempts: usize,
}

#[derive(Clone)]
pub(crate) struct ExamEngine {
    bank: Arc<dyn QuestionBank>,
    store: Arc<dyn SubmissionStore>,
    codec: AnswerCodec,
}

impl ExamEngine {
    pub(crate) fn new(
        bank: Arc<dyn QuestionBank>,
        store: Arc<dyn SubmissionStore>,
        codec: AnswerCodec,
    ) -> Self {
        Self { bank, store, codec }
    }

    pub(crate) async fn start_attempt(
        &self,
        paper_id: &str,
        user_id: &str,
    ) -> Result<StartedAttempt, EngineError> {
        let paper = self.load_paper(paper_id).await?;
        let questions = self.load_questions(&paper).await?;

        let new_submission = NewSubmission {
            id: Uuid::new_v4().to_string(),
            exam_paper_id: paper.id.clone(),
            user_id: user_id.to_string(),
            start_time: primitive_now_utc(),
        };
        let gate = |prior: &[ExamPaperSubmission]| retake_policy::can_start_attempt(&paper, prior);

        let (submission, prior_attempts) =
            match self.store.create_attempt(new_submission, &gate).await? {
                AttemptOutcome::Created { submission, prior_attempts } => {
                    (submission, prior_attempts)
                }
                AttemptOutcome::Denied(reason) => {
                    metrics::retake_denied(reason);
                    tracing::info!(
                        paper_id = %paper.id,
                        user_id = %user_id,
                        reason = %reason,
                        "Attempt denied by retake policy"
                    );
                    return Err(EngineError::RetakeDenied(reason));
                }
            };

        let seed = rand::random::<u64>();
        let mut rng = StdRng::seed_from_u64(seed);
        let composed = exam_composer::compose(&paper, &mut rng)
            .into_iter()
            .filter_map(|slot| {
                let question = questions.get(&slot.question_id)?.clone();
                Some(ComposedQuestion { slot, question })
            })
            .collect();

        metrics::attempt_started();
        tracing::info!(
            submission_id = %submission.id,
            paper_id = %paper.id,
            user_id = %user_id,
            attempt_number = prior_attempts + 1,
            "Attempt started"
        );

        Ok(StartedAttempt {
            submission,
            attempt_number: prior_attempts + 1,
            paper,
            questions: composed,
        })
    }

    /// Stores the answer for one paper slot, replacing any earlier answer for it.
    ///
    /// `paper_question_id` names the slot; a question id is accepted too when the
    /// question appears on the paper exactly once.
    pub(crate) async fn submit_answer(
        &self,
        submission_id: &str,
        paper_question_id: &str,
        raw_payload: &str,
    ) -> Result<SubmittedAnswer, EngineError> {
        let submission = self.open_submission(submission_id).await?;
        let paper = self.load_paper(&submission.exam_paper_id).await?;
        let slot = resolve_slot(&paper, paper_question_id).ok_or_else(|| {
            tracing::debug!(
                submission_id = %submission_id,
                paper_question_id = %paper_question_id,
                "Answer targets a question outside the paper"
            );
            EngineError::QuestionNotInPaper
        })?;
        let question = self.load_question(&slot.question_id).await?;

        let content = self.codec.decode(raw_payload, question.kind()).map_err(|err| {
            tracing::debug!(submission_id = %submission_id, error = %err, "Rejected answer payload");
            EngineError::MalformedAnswer(err.to_string())
        })?;
        let canonical =
            self.codec.encode(&content).map_err(|err| EngineError::MalformedAnswer(err.to_string()))?;

        let answer = self
            .store
            .upsert_answer(NewAnswer {
                id: Uuid::new_v4().to_string(),
                submission_id: submission.id.clone(),
                paper_question_id: slot.id.clone(),
                answer_content: canonical,
                now: primitive_now_utc(),
            })
            .await?
            .ok_or(EngineError::SubmissionNotInProgress)?;

        metrics::answer_submitted();
        tracing::debug!(
            submission_id = %submission.id,
            paper_question_id = %slot.id,
            "Answer stored"
        );

        Ok(SubmittedAnswer { answer, content })
    }

    pub(crate) async fn finalize(&self, submission_id: &str) -> Result<FinalizeResult, EngineError> {
        let submission = self.open_submission(submission_id).await?;
        let paper = self.load_paper(&submission.exam_paper_id).await?;
        let questions = self.load_questions(&paper).await?;

        let codec = self.codec;
        let grader = |_: &ExamPaperSubmission, answers: &[ExamPaperQuestionAnswer]| {
            grading::grade_answers(&paper, &questions, answers, &codec)
        };

        let finalized = self
            .store
            .finalize(submission_id, primitive_now_utc(), &grader)
            .await?
            .ok_or(EngineError::SubmissionNotInProgress)?;

        let summary = finalized.grades.summary;
        metrics::submission_graded(summary.passed);
        tracing::info!(
            submission_id = %submission_id,
            paper_id = %paper.id,
            total_score = summary.total_score,
            passed = summary.passed,
            "Submission graded"
        );

        Ok(FinalizeResult {
            submission: finalized.submission,
            answers: finalized.answers,
            summary,
            max_score: paper.max_score(),
        })
    }

    pub(crate) async fn submission_state(
        &self,
        submission_id: &str,
    ) -> Result<SubmissionState, EngineError> {
        let submission = self
            .store
            .get_submission(submission_id)
            .await?
            .ok_or(EngineError::SubmissionNotFound)?;
        let paper = self.load_paper(&submission.exam_paper_id).await?;
        let answers = self.store.list_answers(submission_id).await?;

        let passed = submission.passed;

        Ok(SubmissionState { submission, paper, answers, passed })
    }

    pub(crate) async fn list_attempts(
        &self,
        paper_id: &str,
        user_id: &str,
    ) -> Result<AttemptHistory, EngineError> {
        let paper = self.load_paper(paper_id).await?;
        let attempts = self.store.list_submissions(&paper.id, user_id).await?;
        let eligibility = retake_policy::can_start_attempt(&paper, &attempts);
        let remaining_attempts = retake_policy::remaining_attempts(&paper, &attempts);

        Ok(AttemptHistory { paper, attempts, eligibility, remaining_attempts })
    }

    pub(crate) async fn ping(&self) -> Result<(), EngineError> {
        self.store.ping().await?;
        Ok(())
    }

    async fn open_submission(&self, submission_id: &str) -> Result<ExamPaperSubmission, EngineError> {
        match self.store.get_submission(submission_id).await? {
            Some(submission) if submission.is_in_progress() => Ok(submission),
            Some(_) => {
                tracing::debug!(submission_id = %submission_id, "Submission already graded");
                Err(EngineError::SubmissionNotInProgress)
            }
            None => {
                tracing::debug!(submission_id = %submission_id, "Submission does not exist");
                Err(EngineError::SubmissionNotInProgress)
            }
        }
    }

    async fn load_paper(&self, paper_id: &str) -> Result<ExamPaper, EngineError> {
        self.bank.get_exam_paper(paper_id).await?.ok_or(EngineError::PaperNotFound)
    }

    async fn load_question(&self, question_id: &str) -> Result<Question, EngineError> {
        self.bank
            .get_question(question_id)
            .await?
            .ok_or_else(|| EngineError::QuestionNotFound(question_id.to_string()))
    }

    async fn load_questions(
        &self,
        paper: &ExamPaper,
    ) -> Result<HashMap<String, Question>, EngineError> {
        let mut questions = HashMap::with_capacity(paper.questions.len());
        for slot in &paper.questions {
            if questions.contains_key(&slot.question_id) {
                continue;
            }
            let question = self.load_question(&slot.question_id).await?;
            questions.insert(slot.question_id.clone(), question);
        }
        Ok(questions)
    }
}

fn resolve_slot<'a>(paper: &'a ExamPaper, key: &str) -> Option<&'a ExamPaperQuestion> {
    if let Some(slot) = paper.find_question(key) {
        return Some(slot);
    }
    let mut by_question = paper.questions.iter().filter(|slot| slot.question_id == key);
    match (by_question.next(), by_question.next()) {
        (Some(slot), None) => Some(slot),
        _ => None,
    }
}
