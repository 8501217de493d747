use std::collections::BTreeSet;

use crate::db::models::{Question, QuestionBody};
use crate::services::answer_codec::AnswerContent;

/// Decides whether `answer` is a correct response to `question`.
///
/// Choice questions require the selected ids to equal the set of correct choice
/// ids exactly; ids that do not belong to the question make the sets differ.
/// Fill-in-blank answers match after trimming and case folding. An answer of the
/// wrong variant is never correct.
pub fn evaluate(question: &Question, answer: &AnswerContent) -> bool {
    match (&question.body, answer) {
        (QuestionBody::Choice { .. }, AnswerContent::Choice { selected_choice_ids }) => {
            let selected: BTreeSet<&str> = selected_choice_ids.iter().map(String::as_str).collect();
            selected == question.correct_choice_ids()
        }
        (
            QuestionBody::FillInBlank { answer: expected, .. },
            AnswerContent::FillInBlank { filled_text },
        ) => normalize_blank(filled_text) == normalize_blank(expected),
        _ => false,
    }
}

fn normalize_blank(text: &str) -> String {
    text.trim().to_lowercase()
}
