//! Input and output shapes of the external services the session machine invokes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::turn::{ResponseType, Turn};

/// Sentinel answer used when a service reply carries nothing usable.
pub const UNPARSEABLE_RESPONSE: &str = "Could not parse response";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Everything the generation service needs for one turn.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub response_type: ResponseType,
    /// Earlier turns sent as context, oldest first.
    pub history: Vec<Turn>,
    /// The question being asked now.
    pub prompt: String,
    pub temperature: f32,
    /// Token exponent; the budget is `2^max_tokens`.
    pub max_tokens: u8,
}

impl ChatRequest {
    /// Chat messages for a text completion: prior text turns as user/assistant
    /// pairs, image turns as their question only, then the prompt.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() * 2 + 1);
        for turn in &self.history {
            messages.push(ChatMessage::user(turn.question.clone()));
            if turn.response_type == ResponseType::Text {
                messages.push(ChatMessage::assistant(turn.answer.clone()));
            }
        }
        messages.push(ChatMessage::user(self.prompt.clone()));
        messages
    }

    /// Questions of the conversation this request continues, oldest first,
    /// ending with the prompt.
    pub fn conversation(&self) -> Vec<&str> {
        self.history
            .iter()
            .map(|turn| turn.question.as_str())
            .chain(std::iter::once(self.prompt.as_str()))
            .collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CompletionMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CompletionChoice {
    #[serde(default)]
    pub message: CompletionMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Chat-completion shaped reply.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GeneratedImage {
    pub url: String,
}

/// Image generation reply.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ImageGeneration {
    #[serde(default)]
    pub data: Vec<GeneratedImage>,
}

/// Result of the generation service, branched on response type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatResult {
    Completion(ChatCompletion),
    Image(ImageGeneration),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TranslatedText {
    pub value: String,
}

/// Translation reply keyed by two-letter language code.
pub type TranslationResult = BTreeMap<String, TranslatedText>;
