//! Wire types for `POST /api/chat` and the validated question.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Request body. `question` is optional on the wire so a missing field is a
/// validation failure rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestionError {
    #[error("question is missing or blank")]
    Blank,

    #[error("question has {actual} characters, maximum is {max}")]
    TooLong { actual: usize, max: usize },
}

/// A trimmed, non-empty visitor question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Trim and validate raw input. `max_chars` counts characters, not bytes;
    /// zero means no limit.
    pub fn parse(raw: Option<&str>, max_chars: usize) -> Result<Self, QuestionError> {
        let trimmed = raw.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            return Err(QuestionError::Blank);
        }

        let actual = trimmed.chars().count();
        if max_chars > 0 && actual > max_chars {
            return Err(QuestionError::TooLong {
                actual,
                max: max_chars,
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
