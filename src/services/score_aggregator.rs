use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    pub total_score: i32,
    pub passed: bool,
}

pub fn aggregate<I>(obtained_scores: I, passing_score: i32) -> ScoreSummary
where
    I: IntoIterator<Item = i32>,
{
    let total_score =
        obtained_scores.into_iter().fold(0i32, |acc, score| acc.saturating_add(score));
    ScoreSummary { total_score, passed: total_score >= passing_score }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_scores_and_compares_inclusively() {
        assert_eq!(aggregate([10, 0, 5], 15), ScoreSummary { total_score: 15, passed: true });
        assert_eq!(aggregate([10, 0, 4], 15), ScoreSummary { total_score: 14, passed: false });
    }

    #[test]
    fn no_answers_scores_zero() {
        assert_eq!(aggregate(std::iter::empty(), 0), ScoreSummary { total_score: 0, passed: true });
        assert_eq!(aggregate(std::iter::empty(), 1), ScoreSummary { total_score: 0, passed: false });
    }
}
