pub(crate) mod answer_codec;
pub(crate) mod answer_evaluator;
pub(crate) mod exam_composer;
pub(crate) mod grading;
pub(crate) mod retake_policy;
pub(crate) mod score_aggregator;
pub(crate) mod submission_lifecycle;
