//! Conversation turns and the archive they are stored in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Selects the generation service and the answer formatting path.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Text,
    Image,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown response type: {other}")),
        }
    }
}

/// One question/answer exchange.
///
/// The serialized field names follow the archive format shared with
/// previously persisted sessions (`responseType`, `finish_reason`, `responseTime`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Turn {
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(rename = "responseType", default)]
    pub response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(rename = "responseTime", default)]
    pub response_time_ms: u64,
}

impl Turn {
    /// Create a turn with a fresh unique id.
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        response_type: ResponseType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            answer: answer.into(),
            response_type,
            finish_reason: None,
            response_time_ms: 0,
        }
    }

    pub fn with_finish_reason(mut self, reason: Option<String>) -> Self {
        self.finish_reason = reason;
        self
    }

    pub fn with_response_time(mut self, millis: u64) -> Self {
        self.response_time_ms = millis;
        self
    }

    /// True when the model stopped because it ran out of tokens.
    pub fn is_incomplete(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

/// Past conversations keyed by their opening question.
pub type Archive = BTreeMap<String, Vec<Turn>>;

/// Key a conversation is archived under: the question of its oldest turn.
///
/// `answers` is most-recent-first, so the oldest turn is the last element.
pub fn archive_key(answers: &[Turn]) -> Option<&str> {
    answers.last().map(|turn| turn.question.as_str())
}

/// Markdown image reference used as the answer of an image turn.
pub fn image_markdown(prompt: &str, url: &str) -> String {
    let alt = prompt.replace(['[', ']'], "").replace('\n', " ");
    format!("![{}]({})", alt.trim(), url)
}
