use std::collections::HashMap;

use async_trait::async_trait;
use time::PrimitiveDateTime;
use tokio::sync::RwLock;

use crate::db::models::{ExamPaper, ExamPaperQuestionAnswer, ExamPaperSubmission, Question};
use crate::repositories::{
    AttemptGate, AttemptOutcome, FinalizedSubmission, Grader, NewAnswer, NewSubmission,
    QuestionBank, StoreError, SubmissionStore,
};

/// Process-local store. Every mutating call holds the write lock for its whole duration.
#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    papers: HashMap<String, ExamPaper>,
    questions: HashMap<String, Question>,
    submissions: HashMap<String, ExamPaperSubmission>,
    attempts: HashMap<(String, String), Vec<String>>,
    answers: HashMap<String, Vec<ExamPaperQuestionAnswer>>,
}

impl Inner {
    fn attempts_of(&self, paper_id: &str, user_id: &str) -> Vec<ExamPaperSubmission> {
        self.attempts
            .get(&(paper_id.to_string(), user_id.to_string()))
            .map(|ids| ids.iter().filter_map(|id| self.submissions.get(id)).cloned().collect())
            .unwrap_or_default()
    }
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn insert_question(&self, question: Question) {
        let mut inner = self.inner.write().await;
        inner.questions.insert(question.id.clone(), question);
    }

    pub(crate) async fn insert_paper(&self, paper: ExamPaper) {
        let mut inner = self.inner.write().await;
        inner.papers.insert(paper.id.clone(), paper);
    }
}

#[async_trait]
impl QuestionBank for MemoryStore {
    async fn get_exam_paper(&self, id: &str) -> Result<Option<ExamPaper>, StoreError> {
        Ok(self.inner.read().await.papers.get(id).cloned())
    }

    async fn get_question(&self, id: &str) -> Result<Option<Question>, StoreError> {
        Ok(self.inner.read().await.questions.get(id).cloned())
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn create_attempt(
        &self,
        submission: NewSubmission,
        gate: AttemptGate<'_>,
    ) -> Result<AttemptOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        let prior = inner.attempts_of(&submission.exam_paper_id, &submission.user_id);
        if let Err(denial) = gate(prior.as_slice()) {
            return Ok(AttemptOutcome::Denied(denial));
        }
        if inner.submissions.contains_key(&submission.id) {
            return Err(StoreError::Conflict(format!(
                "submission {} already exists",
                submission.id
            )));
        }

        let created = ExamPaperSubmission {
            id: submission.id,
            exam_paper_id: submission.exam_paper_id,
            user_id: submission.user_id,
            start_time: submission.start_time,
            submission_time: None,
            total_score: 0,
            passed: None,
        };
        inner
            .attempts
            .entry((created.exam_paper_id.clone(), created.user_id.clone()))
            .or_default()
            .push(created.id.clone());
        inner.submissions.insert(created.id.clone(), created.clone());

        Ok(AttemptOutcome::Created { submission: created, prior_attempts: prior.len() })
    }

    async fn get_submission(&self, id: &str) -> Result<Option<ExamPaperSubmission>, StoreError> {
        Ok(self.inner.read().await.submissions.get(id).cloned())
    }

    async fn list_submissions(
        &self,
        paper_id: &str,
        user_id: &str,
    ) -> Result<Vec<ExamPaperSubmission>, StoreError> {
        Ok(self.inner.read().await.attempts_of(paper_id, user_id))
    }

    async fn list_answers(
        &self,
        submission_id: &str,
    ) -> Result<Vec<ExamPaperQuestionAnswer>, StoreError> {
        Ok(self.inner.read().await.answers.get(submission_id).cloned().unwrap_or_default())
    }

    async fn upsert_answer(
        &self,
        answer: NewAnswer,
    ) -> Result<Option<ExamPaperQuestionAnswer>, StoreError> {
        let mut inner = self.inner.write().await;
        let open = inner
            .submissions
            .get(&answer.submission_id)
            .is_some_and(ExamPaperSubmission::is_in_progress);
        if !open {
            return Ok(None);
        }

        let answers = inner.answers.entry(answer.submission_id.clone()).or_default();
        if let Some(existing) = answers
            .iter_mut()
            .find(|existing| existing.exam_paper_question_id == answer.paper_question_id)
        {
            existing.answer_content = answer.answer_content;
            existing.updated_at = answer.now;
            return Ok(Some(existing.clone()));
        }

        let stored = ExamPaperQuestionAnswer {
            id: answer.id,
            exam_paper_question_id: answer.paper_question_id,
            exam_paper_submission_id: answer.submission_id,
            answer_content: answer.answer_content,
            is_correct: false,
            obtained_score: 0,
            created_at: answer.now,
            updated_at: answer.now,
        };
        answers.push(stored.clone());
        Ok(Some(stored))
    }

    async fn finalize(
        &self,
        submission_id: &str,
        submission_time: PrimitiveDateTime,
        grader: Grader<'_>,
    ) -> Result<Option<FinalizedSubmission>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(submission) = inner.submissions.get(submission_id).cloned() else {
            return Ok(None);
        };
        if !submission.is_in_progress() {
            return Ok(None);
        }

        let mut answers = inner.answers.get(submission_id).cloned().unwrap_or_default();
        let grades = grader(&submission, &answers);
        for answer in answers.iter_mut() {
            let grade = grades
                .grades
                .iter()
                .find(|grade| grade.answer_id == answer.id)
                .ok_or_else(|| StoreError::Integrity(format!("answer {} was not graded", answer.id)))?;
            answer.is_correct = grade.is_correct;
            answer.obtained_score = grade.obtained_score;
        }

        let graded = ExamPaperSubmission {
            submission_time: Some(submission_time.max(submission.start_time)),
            total_score: grades.summary.total_score,
            passed: Some(grades.summary.passed),
            ..submission
        };
        inner.answers.insert(submission_id.to_string(), answers.clone());
        inner.submissions.insert(submission_id.to_string(), graded.clone());

        Ok(Some(FinalizedSubmission { submission: graded, answers, grades }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::services::grading::{AnswerGrade, GradeSheet};
    use crate::services::retake_policy::RetakeDenial;
    use crate::services::score_aggregator::ScoreSummary;

    fn new_submission(id: &str) -> NewSubmission {
        NewSubmission {
            id: id.to_string(),
            exam_paper_id: "paper".to_string(),
            user_id: "user".to_string(),
            start_time: primitive_now_utc(),
        }
    }

    fn new_answer(id: &str, submission_id: &str, slot: &str, content: &str) -> NewAnswer {
        NewAnswer {
            id: id.to_string(),
            submission_id: submission_id.to_string(),
            paper_question_id: slot.to_string(),
            answer_content: content.to_string(),
            now: primitive_now_utc(),
        }
    }

    fn one_open_attempt(prior: &[ExamPaperSubmission]) -> Result<(), RetakeDenial> {
        if prior.iter().any(ExamPaperSubmission::is_in_progress) {
            Err(RetakeDenial::NoPriorAttemptAllowedWhileInProgress)
        } else {
            Ok(())
        }
    }

    fn full_marks(_: &ExamPaperSubmission, answers: &[ExamPaperQuestionAnswer]) -> GradeSheet {
        let grades: Vec<AnswerGrade> = answers
            .iter()
            .map(|answer| AnswerGrade {
                answer_id: answer.id.clone(),
                is_correct: true,
                obtained_score: 5,
            })
            .collect();
        let total_score = grades.iter().map(|grade| grade.obtained_score).sum();
        GradeSheet { grades, summary: ScoreSummary { total_score, passed: true } }
    }

    #[tokio::test]
    async fn gate_sees_prior_attempts() {
        let store = MemoryStore::new();
        let first = store.create_attempt(new_submission("s1"), &one_open_attempt).await.unwrap();
        assert!(matches!(first, AttemptOutcome::Created { prior_attempts: 0, .. }));

        let second = store.create_attempt(new_submission("s2"), &one_open_attempt).await.unwrap();
        assert_eq!(
            second,
            AttemptOutcome::Denied(RetakeDenial::NoPriorAttemptAllowedWhileInProgress)
        );
        assert_eq!(store.list_submissions("paper", "user").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_creates_admit_one() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for index in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create_attempt(new_submission(&format!("s{index}")), &one_open_attempt)
                    .await
                    .unwrap()
            }));
        }

        let mut created = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), AttemptOutcome::Created { .. }) {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_answer() {
        let store = MemoryStore::new();
        store.create_attempt(new_submission("s1"), &one_open_attempt).await.unwrap();

        let first = store.upsert_answer(new_answer("a1", "s1", "slot", "one")).await.unwrap();
        let second = store.upsert_answer(new_answer("a2", "s1", "slot", "two")).await.unwrap();

        assert_eq!(first.unwrap().id, "a1");
        let second = second.unwrap();
        assert_eq!(second.id, "a1");
        assert_eq!(second.answer_content, "two");
        assert_eq!(store.list_answers("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finalize_closes_submission_once() {
        let store = MemoryStore::new();
        store.create_attempt(new_submission("s1"), &one_open_attempt).await.unwrap();
        store.upsert_answer(new_answer("a1", "s1", "slot-1", "x")).await.unwrap();
        store.upsert_answer(new_answer("a2", "s1", "slot-2", "y")).await.unwrap();

        let finalized =
            store.finalize("s1", primitive_now_utc(), &full_marks).await.unwrap().unwrap();
        assert_eq!(finalized.submission.total_score, 10);
        assert_eq!(finalized.submission.passed, Some(true));
        assert!(finalized.submission.submission_time.is_some());
        assert!(finalized.answers.iter().all(|answer| answer.is_correct));

        assert!(store.finalize("s1", primitive_now_utc(), &full_marks).await.unwrap().is_none());
        assert!(store.upsert_answer(new_answer("a3", "s1", "slot-1", "z")).await.unwrap().is_none());
        assert!(store.finalize("missing", primitive_now_utc(), &full_marks).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn submission_time_never_precedes_start() {
        let store = MemoryStore::new();
        let mut submission = new_submission("s1");
        let start = primitive_now_utc() + time::Duration::hours(1);
        submission.start_time = start;
        store.create_attempt(submission, &one_open_attempt).await.unwrap();

        let finalized =
            store.finalize("s1", primitive_now_utc(), &full_marks).await.unwrap().unwrap();
        assert_eq!(finalized.submission.submission_time, Some(start));
    }
}
