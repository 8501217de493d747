use std::collections::HashMap;

use crate::db::models::{ExamPaper, ExamPaperQuestionAnswer, Question};
use crate::services::answer_codec::AnswerCodec;
use crate::services::answer_evaluator;
use crate::services::score_aggregator::{self, ScoreSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerGrade {
    pub answer_id: String,
    pub is_correct: bool,
    pub obtained_score: i32,
}

/// Grades for every stored answer of a submission plus the resulting total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeSheet {
    pub grades: Vec<AnswerGrade>,
    pub summary: ScoreSummary,
}

/// Grades `answers` against `paper`.
///
/// `questions` maps question ids to the question records the paper refers to.
/// Every stored answer receives a grade. Questions without an answer contribute
/// nothing to the total. Answers whose slot is no longer on the paper, whose
/// question is missing, or whose payload no longer decodes score zero.
pub fn grade_answers(
    paper: &ExamPaper,
    questions: &HashMap<String, Question>,
    answers: &[ExamPaperQuestionAnswer],
    codec: &AnswerCodec,
) -> GradeSheet {
    let grades: Vec<AnswerGrade> = answers
        .iter()
        .map(|answer| {
            let outcome = paper
                .find_question(&answer.exam_paper_question_id)
                .and_then(|slot| {
                    let question = questions.get(&slot.question_id)?;
                    Some((slot, question))
                })
                .map(|(slot, question)| {
                    let correct = match codec.decode(&answer.answer_content, question.kind()) {
                        Ok(decoded) => answer_evaluator::evaluate(question, &decoded),
                        Err(err) => {
                            tracing::warn!(
                                answer_id = %answer.id,
                                error = %err,
                                "Stored answer no longer decodes; grading as incorrect"
                            );
                            false
                        }
                    };
                    (correct, slot.score)
                });

            match outcome {
                Some((true, score)) => AnswerGrade {
                    answer_id: answer.id.clone(),
                    is_correct: true,
                    obtained_score: score,
                },
                _ => AnswerGrade { answer_id: answer.id.clone(), is_correct: false, obtained_score: 0 },
            }
        })
        .collect();

    let summary = score_aggregator::aggregate(
        grades.iter().map(|grade| grade.obtained_score),
        paper.passing_score,
    );

    GradeSheet { grades, summary }
}
