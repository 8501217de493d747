//! Encoding of the per-question answer payload.
//!
//! Wire format is a JSON object tagged by `type`:
//! `{"type":"ChoiceAnswer","selectedChoiceIds":["<id>", ...]}` or
//! `{"type":"FillInBlankAnswer","filledText":"<text>"}`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::types::QuestionKind;

/// Upper bound on the whole encoded payload, in characters.
pub const MAX_PAYLOAD_CHARS: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnswerContent {
    #[serde(rename = "ChoiceAnswer", rename_all = "camelCase")]
    Choice { selected_choice_ids: BTreeSet<String> },
    #[serde(rename = "FillInBlankAnswer", rename_all = "camelCase")]
    FillInBlank { filled_text: String },
}

impl AnswerContent {
    pub fn kind(&self) -> QuestionKind {
        match self {
            AnswerContent::Choice { .. } => QuestionKind::Choice,
            AnswerContent::FillInBlank { .. } => QuestionKind::FillInBlank,
        }
    }
}

#[cfg(test)]
impl AnswerContent {
    pub fn choice<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnswerContent::Choice { selected_choice_ids: ids.into_iter().map(Into::into).collect() }
    }

    pub fn fill_in_blank(text: impl Into<String>) -> Self {
        AnswerContent::FillInBlank { filled_text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("answer payload exceeds {limit} characters")]
    TooLong { limit: usize },
    #[error("answer payload is not well-formed: {0}")]
    Malformed(String),
    #[error("expected a {expected} answer but got a {found} answer")]
    KindMismatch { expected: QuestionKind, found: QuestionKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerCodec {
    max_chars: usize,
}

impl Default for AnswerCodec {
    fn default() -> Self {
        Self { max_chars: MAX_PAYLOAD_CHARS }
    }
}

impl AnswerCodec {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn encode(&self, answer: &AnswerContent) -> Result<String, CodecError> {
        let encoded =
            serde_json::to_string(answer).map_err(|err| CodecError::Malformed(err.to_string()))?;
        self.check_length(&encoded)?;
        Ok(encoded)
    }

    /// Decodes `raw` and checks it answers a question of kind `expected`.
    pub fn decode(&self, raw: &str, expected: QuestionKind) -> Result<AnswerContent, CodecError> {
        self.check_length(raw)?;

        let answer: AnswerContent =
            serde_json::from_str(raw).map_err(|err| CodecError::Malformed(err.to_string()))?;

        let found = answer.kind();
        if found != expected {
            return Err(CodecError::KindMismatch { expected, found });
        }

        Ok(answer)
    }

    fn check_length(&self, payload: &str) -> Result<(), CodecError> {
        // Byte length bounds the char count from above.
        if payload.len() > self.max_chars && payload.chars().count() > self.max_chars {
            return Err(CodecError::TooLong { limit: self.max_chars });
        }
        Ok(())
    }
}
