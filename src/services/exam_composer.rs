use rand::seq::SliceRandom;
use rand::Rng;

use crate::db::models::{ExamPaper, ExamPaperQuestion};

/// Question order for a new attempt.
///
/// Papers without shuffling present questions by `order_index`, ties broken by id.
/// Shuffled papers get a fresh permutation from `rng` on every call.
pub fn compose<R: Rng + ?Sized>(paper: &ExamPaper, rng: &mut R) -> Vec<ExamPaperQuestion> {
    let mut questions = ordered(&paper.questions);
    if paper.shuffle_questions {
        questions.shuffle(rng);
    }
    questions
}

pub fn ordered(questions: &[ExamPaperQuestion]) -> Vec<ExamPaperQuestion> {
    let mut sorted = questions.to_vec();
    sorted.sort_by(|a, b| a.order_index.cmp(&b.order_index).then_with(|| a.id.cmp(&b.id)));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::core::time::primitive_now_utc;

    fn paper(shuffle: bool, slots: &[(&str, i32)]) -> ExamPaper {
        ExamPaper {
            id: "paper".to_string(),
            title: "Geography".to_string(),
            description: None,
            creation_time: primitive_now_utc(),
            duration_minutes: 60,
            shuffle_questions: shuffle,
            allow_retake: false,
            max_retake_count: 0,
            passing_score: 0,
            questions: slots
                .iter()
                .map(|(id, order)| ExamPaperQuestion {
                    id: id.to_string(),
                    exam_paper_id: "paper".to_string(),
                    question_id: format!("q-{id}"),
                    order_index: *order,
                    score: 5,
                })
                .collect(),
        }
    }

    fn ids(questions: &[ExamPaperQuestion]) -> Vec<&str> {
        questions.iter().map(|question| question.id.as_str()).collect()
    }

    #[test]
    fn unshuffled_paper_sorts_by_order_then_id() {
        let paper = paper(false, &[("c", 2), ("b", 1), ("a", 2), ("d", 0)]);
        let mut rng = StdRng::seed_from_u64(7);

        let composed = compose(&paper, &mut rng);
        assert_eq!(ids(&composed), vec!["d", "b", "a", "c"]);
        assert_eq!(compose(&paper, &mut rng), composed);
    }

    #[test]
    fn shuffled_paper_is_a_permutation() {
        let slots: Vec<(String, i32)> = (0..10).map(|i| (format!("s{i}"), i)).collect();
        let slot_refs: Vec<(&str, i32)> =
            slots.iter().map(|(id, order)| (id.as_str(), *order)).collect();
        let paper = paper(true, &slot_refs);
        let baseline = ordered(&paper.questions);

        let mut differs = false;
        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let composed = compose(&paper, &mut rng);

            let mut sorted = ids(&composed);
            sorted.sort();
            let mut expected = ids(&baseline);
            expected.sort();
            assert_eq!(sorted, expected);

            differs |= composed != baseline;
        }
        assert!(differs, "shuffle never changed the order");
    }

    #[test]
    fn empty_paper_composes_to_nothing() {
        let paper = paper(true, &[]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(compose(&paper, &mut rng).is_empty());
    }
}
