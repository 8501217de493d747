use std::fmt;

use serde::Serialize;

use crate::db::models::{ExamPaper, ExamPaperSubmission};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RetakeDenial {
    NoPriorAttemptAllowedWhileInProgress,
    RetakeNotAllowed,
    RetakeLimitExceeded,
}

impl RetakeDenial {
    pub fn as_str(self) -> &'static str {
        match self {
            RetakeDenial::NoPriorAttemptAllowedWhileInProgress => {
                "NoPriorAttemptAllowedWhileInProgress"
            }
            RetakeDenial::RetakeNotAllowed => "RetakeNotAllowed",
            RetakeDenial::RetakeLimitExceeded => "RetakeLimitExceeded",
        }
    }
}

impl fmt::Display for RetakeDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a user may open a new attempt on `paper`.
///
/// `prior` holds every earlier submission of this user for this paper.
/// `max_retake_count` counts retakes, so a paper allows `1 + max_retake_count`
/// completed attempts in total.
pub fn can_start_attempt(
    paper: &ExamPaper,
    prior: &[ExamPaperSubmission],
) -> Result<(), RetakeDenial> {
    if prior.iter().any(ExamPaperSubmission::is_in_progress) {
        return Err(RetakeDenial::NoPriorAttemptAllowedWhileInProgress);
    }

    let completed = prior.len();
    if completed == 0 {
        return Ok(());
    }

    if !paper.allow_retake {
        return Err(RetakeDenial::RetakeNotAllowed);
    }

    let retakes_taken = completed - 1;
    if retakes_taken >= max_retakes(paper) {
        return Err(RetakeDenial::RetakeLimitExceeded);
    }

    Ok(())
}

/// Attempts still available to the user after `prior`, counting an open one as used.
pub fn remaining_attempts(paper: &ExamPaper, prior: &[ExamPaperSubmission]) -> usize {
    let allowed = if paper.allow_retake { 1 + max_retakes(paper) } else { 1 };
    allowed.saturating_sub(prior.len())
}

fn max_retakes(paper: &ExamPaper) -> usize {
    usize::try_from(paper.max_retake_count).unwrap_or(0)
}
