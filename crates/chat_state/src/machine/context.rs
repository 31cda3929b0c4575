//! Session context - the working memory carried across transitions
//!
//! Actions never mutate the context directly. They return a `ContextPatch`
//! which is merged field by field; object-valued fields are replaced whole.

use chat_core::{
    Archive, ChatRequest, ResponseType, SettingsSnapshot, Turn, UserRef, MAX_TOKEN_EXPONENT,
    MIN_TOKEN_EXPONENT, PRECISION_PRESETS,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChangeError {
    #[error("Unknown or malformed property {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("temperatureIndex {0} is outside the preset list")]
    TemperatureIndex(usize),

    #[error("max_tokens exponent {0} must be between 7 and 11")]
    MaxTokens(u8),

    #[error("lang_code must not be empty")]
    EmptyLangCode,
}

/// Payload of the generic `CHANGE` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value")]
pub enum ContextChange {
    #[serde(rename = "requestText")]
    RequestText(String),
    #[serde(rename = "responseType")]
    ResponseType(ResponseType),
    #[serde(rename = "temperatureIndex")]
    TemperatureIndex(usize),
    #[serde(rename = "max_tokens")]
    MaxTokens(u8),
    #[serde(rename = "lang_code")]
    LangCode(String),
    #[serde(rename = "silent")]
    Silent(bool),
    #[serde(rename = "editing")]
    Editing(Option<String>),
    /// Replace the active answers, used for inline question edits.
    #[serde(rename = "answers")]
    Answers(Vec<Turn>),
}

impl ContextChange {
    /// Build a change from a raw key/value pair.
    pub fn from_key_value(key: &str, value: serde_json::Value) -> Result<Self, ChangeError> {
        let change: ContextChange =
            serde_json::from_value(serde_json::json!({ "key": key, "value": value })).map_err(
                |e| ChangeError::Malformed {
                    key: key.to_string(),
                    reason: e.to_string(),
                },
            )?;
        change.validate()?;
        Ok(change)
    }

    pub fn validate(&self) -> Result<(), ChangeError> {
        match self {
            Self::TemperatureIndex(index) if *index >= PRECISION_PRESETS.len() => {
                Err(ChangeError::TemperatureIndex(*index))
            }
            Self::MaxTokens(exp) if !(MIN_TOKEN_EXPONENT..=MAX_TOKEN_EXPONENT).contains(exp) => {
                Err(ChangeError::MaxTokens(*exp))
            }
            Self::LangCode(code) if code.trim().is_empty() => Err(ChangeError::EmptyLangCode),
            _ => Ok(()),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::RequestText(_) => "requestText",
            Self::ResponseType(_) => "responseType",
            Self::TemperatureIndex(_) => "temperatureIndex",
            Self::MaxTokens(_) => "max_tokens",
            Self::LangCode(_) => "lang_code",
            Self::Silent(_) => "silent",
            Self::Editing(_) => "editing",
            Self::Answers(_) => "answers",
        }
    }
}

/// Partial update produced by an action.
///
/// `None` leaves a field untouched. Optional context fields use a nested
/// option so a patch can clear them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPatch {
    pub answers: Option<Vec<Turn>>,
    pub sessions: Option<Archive>,
    pub request_text: Option<String>,
    pub response_text: Option<String>,
    pub response_type: Option<ResponseType>,
    pub temperature_index: Option<usize>,
    pub max_tokens: Option<u8>,
    pub lang_code: Option<String>,
    pub silent: Option<bool>,
    pub user: Option<Option<UserRef>>,
    pub start_index: Option<Option<usize>>,
    pub editing: Option<Option<String>>,
    pub timestamp: Option<Option<DateTime<Utc>>>,
    pub ticket: Option<u64>,
    pub load_ticket: Option<u64>,
}

impl ContextPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Active conversation, most recent turn first.
    pub answers: Vec<Turn>,
    pub sessions: Archive,
    #[serde(rename = "requestText")]
    pub request_text: String,
    #[serde(rename = "responseText")]
    pub response_text: String,
    #[serde(rename = "responseType")]
    pub response_type: ResponseType,
    #[serde(rename = "temperatureIndex")]
    pub temperature_index: usize,
    pub max_tokens: u8,
    pub lang_code: String,
    pub silent: bool,
    pub user: Option<UserRef>,
    /// Fork point of a regeneration.
    pub start_index: Option<usize>,
    /// Id of the turn being edited inline.
    pub editing: Option<String>,
    /// Start of the request in flight.
    pub timestamp: Option<DateTime<Utc>>,
    /// Last issued request ticket.
    pub ticket: u64,
    /// Ticket of the latest archive load; older loads are stale.
    #[serde(default)]
    pub load_ticket: u64,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::with_settings(SettingsSnapshot::default())
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with previously saved settings merged in.
    pub fn with_settings(settings: SettingsSnapshot) -> Self {
        let settings = settings.sanitized();
        Self {
            answers: Vec::new(),
            sessions: Archive::new(),
            request_text: String::new(),
            response_text: String::new(),
            response_type: settings.response_type,
            temperature_index: settings.temperature_index,
            max_tokens: settings.max_tokens,
            lang_code: settings.lang_code,
            silent: settings.silent,
            user: None,
            start_index: None,
            editing: None,
            timestamp: None,
            ticket: 0,
            load_ticket: 0,
        }
    }

    pub fn with_user(mut self, user: Option<UserRef>) -> Self {
        self.user = user;
        self
    }

    /// Preferences that should survive a restart.
    pub fn settings(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            response_type: self.response_type,
            temperature_index: self.temperature_index,
            max_tokens: self.max_tokens,
            lang_code: self.lang_code.clone(),
            silent: self.silent,
        }
    }

    pub fn apply(&mut self, patch: ContextPatch) {
        if let Some(answers) = patch.answers {
            self.answers = answers;
        }
        if let Some(sessions) = patch.sessions {
            self.sessions = sessions;
        }
        if let Some(request_text) = patch.request_text {
            self.request_text = request_text;
        }
        if let Some(response_text) = patch.response_text {
            self.response_text = response_text;
        }
        if let Some(response_type) = patch.response_type {
            self.response_type = response_type;
        }
        if let Some(index) = patch.temperature_index {
            self.temperature_index = index;
        }
        if let Some(max_tokens) = patch.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(lang_code) = patch.lang_code {
            self.lang_code = lang_code;
        }
        if let Some(silent) = patch.silent {
            self.silent = silent;
        }
        if let Some(user) = patch.user {
            self.user = user;
        }
        if let Some(start_index) = patch.start_index {
            self.start_index = start_index;
        }
        if let Some(editing) = patch.editing {
            self.editing = editing;
        }
        if let Some(timestamp) = patch.timestamp {
            self.timestamp = timestamp;
        }
        if let Some(ticket) = patch.ticket {
            self.ticket = ticket;
        }
        if let Some(load_ticket) = patch.load_ticket {
            self.load_ticket = load_ticket;
        }
    }

    pub fn temperature(&self) -> f32 {
        self.settings().temperature()
    }

    /// Conversation prefix to send with the pending request.
    ///
    /// With a fork point `k` the prefix is `answers[k..]` oldest first: the
    /// older turns become history and turn `k` is re-asked with `requestText`.
    /// Without one the whole active conversation is history.
    pub fn chat_request(&self) -> ChatRequest {
        let history_start = match self.start_index {
            Some(index) if index < self.answers.len() => index + 1,
            _ => 0,
        };
        let history = self.answers[history_start..].iter().rev().cloned().collect();
        ChatRequest {
            response_type: self.response_type,
            history,
            prompt: self.request_text.clone(),
            temperature: self.temperature(),
            max_tokens: self.max_tokens,
        }
    }
}
