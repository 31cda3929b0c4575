//! Session events - inputs that drive state transitions
//!
//! User events come from the front end; completion events are reported by
//! the owning loop when an effect settles.

use chat_core::{Archive, ChatResult, SettingsSnapshot, TranslationResult, Turn, UserRef};
use serde::{Deserialize, Serialize};

use super::context::ContextChange;
use super::effects::ServiceKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    // ========== User Events ==========
    /// Start voice capture.
    Ask,

    /// Submit `requestText`. `index` regenerates from an earlier turn.
    Text {
        #[serde(default)]
        index: Option<usize>,
    },

    /// Stop voice capture.
    Stop,

    /// Transcript from the speech recognizer.
    Heard { transcript: String },

    /// Archive the active conversation.
    Quit,

    /// Set one context property.
    Change { change: ContextChange },

    /// Load an archived conversation.
    Restore { answers: Vec<Turn> },

    /// Attach or replace the signed-in user.
    Auth {
        #[serde(default)]
        user: Option<UserRef>,
    },

    /// Wipe all archived conversations.
    Clear,

    /// Remove one archived conversation.
    Drop { question: String },

    /// Re-run the service that failed.
    Retry,

    /// Leave the failed state without retrying.
    Dismiss,

    // ========== Service Completions ==========
    SettingsLoaded {
        #[serde(default)]
        settings: Option<SettingsSnapshot>,
    },

    /// Archive read by the load issued under `ticket`.
    SessionsLoaded { ticket: u64, sessions: Archive },

    ListeningStarted,

    ListeningStopped,

    ChatResponse { ticket: u64, result: ChatResult },

    PauseElapsed,

    Translated { result: TranslationResult },

    Spoken,

    SessionsStored { sessions: Archive },

    SessionsDropped { sessions: Archive },

    /// A service invocation failed. Generation and archive load failures
    /// carry their ticket.
    ServiceFailed {
        service: ServiceKind,
        error: String,
        #[serde(default)]
        ticket: Option<u64>,
    },
}

impl SessionEvent {
    pub fn change(change: ContextChange) -> Self {
        Self::Change { change }
    }

    pub fn text() -> Self {
        Self::Text { index: None }
    }

    pub fn regenerate(index: usize) -> Self {
        Self::Text { index: Some(index) }
    }

    pub fn failed(service: ServiceKind, error: impl ToString) -> Self {
        Self::ServiceFailed {
            service,
            error: error.to_string(),
            ticket: None,
        }
    }

    pub fn chat_failed(ticket: u64, error: impl ToString) -> Self {
        Self::ServiceFailed {
            service: ServiceKind::SendChatRequest,
            error: error.to_string(),
            ticket: Some(ticket),
        }
    }

    pub fn load_failed(ticket: u64, error: impl ToString) -> Self {
        Self::ServiceFailed {
            service: ServiceKind::LoadSessions,
            error: error.to_string(),
            ticket: Some(ticket),
        }
    }

    /// Event name as used in logs and history.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ask => "ASK",
            Self::Text { .. } => "TEXT",
            Self::Stop => "STOP",
            Self::Heard { .. } => "HEARD",
            Self::Quit => "QUIT",
            Self::Change { .. } => "CHANGE",
            Self::Restore { .. } => "RESTORE",
            Self::Auth { .. } => "AUTH",
            Self::Clear => "CLEAR",
            Self::Drop { .. } => "DROP",
            Self::Retry => "RETRY",
            Self::Dismiss => "DISMISS",
            Self::SettingsLoaded { .. } => "SETTINGS_LOADED",
            Self::SessionsLoaded { .. } => "SESSIONS_LOADED",
            Self::ListeningStarted => "LISTENING_STARTED",
            Self::ListeningStopped => "LISTENING_STOPPED",
            Self::ChatResponse { .. } => "CHAT_RESPONSE",
            Self::PauseElapsed => "PAUSE_ELAPSED",
            Self::Translated { .. } => "TRANSLATED",
            Self::Spoken => "SPOKEN",
            Self::SessionsStored { .. } => "SESSIONS_STORED",
            Self::SessionsDropped { .. } => "SESSIONS_DROPPED",
            Self::ServiceFailed { .. } => "SERVICE_FAILED",
        }
    }

    /// Check if this event is user-initiated.
    pub fn is_user_event(&self) -> bool {
        matches!(
            self,
            Self::Ask
                | Self::Text { .. }
                | Self::Stop
                | Self::Quit
                | Self::Change { .. }
                | Self::Restore { .. }
                | Self::Auth { .. }
                | Self::Clear
                | Self::Drop { .. }
                | Self::Retry
                | Self::Dismiss
        )
    }

    /// Events accepted in every state.
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            Self::Change { .. }
                | Self::Restore { .. }
                | Self::Auth { .. }
                | Self::Clear
                | Self::Drop { .. }
                | Self::SettingsLoaded { .. }
        )
    }
}
