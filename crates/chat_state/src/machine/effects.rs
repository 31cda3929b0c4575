//! Effects - side effects requested by a transition
//!
//! The transition function never performs I/O. It returns effects and the
//! owning loop runs them, reporting each outcome back as an event.

use std::time::Duration;

use chat_core::{Archive, ChatRequest, Turn, UserRef};
use serde::{Deserialize, Serialize};

/// Delay spent in `request.response.pause` before speaking.
pub const RESPONSE_PAUSE: Duration = Duration::from_secs(1);

/// External services the machine can invoke.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ServiceKind {
    LoadSessions,
    StartListening,
    StopListening,
    SendChatRequest,
    LoadTranslation,
    SpeakText,
    StoreSessions,
    DropSessions,
}

impl ServiceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadSessions => "loadSession",
            Self::StartListening => "startListening",
            Self::StopListening => "stopListening",
            Self::SendChatRequest => "sendChatRequest",
            Self::LoadTranslation => "loadTranslation",
            Self::SpeakText => "speakText",
            Self::StoreSessions => "storeSession",
            Self::DropSessions => "dropSessions",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Read the saved settings snapshot.
    LoadSettings,
    LoadSessions {
        ticket: u64,
        user: Option<UserRef>,
    },
    StartListening {
        lang_code: String,
    },
    StopListening,
    SendChatRequest {
        ticket: u64,
        request: ChatRequest,
    },
    /// Report `PauseElapsed` after `duration`.
    Pause {
        duration: Duration,
    },
    /// The answer is on screen; front ends attach copy handlers here.
    Rendered {
        turn: Option<Turn>,
    },
    SpeakText {
        text: String,
        lang_code: String,
    },
    LoadTranslation {
        text: String,
        lang_code: String,
    },
    StoreSessions {
        user: Option<UserRef>,
        sessions: Archive,
    },
    DropSessions {
        user: Option<UserRef>,
    },
}

impl Effect {
    /// The service whose outcome the machine waits for, if any.
    pub fn service(&self) -> Option<ServiceKind> {
        match self {
            Self::LoadSessions { .. } => Some(ServiceKind::LoadSessions),
            Self::StartListening { .. } => Some(ServiceKind::StartListening),
            Self::StopListening => Some(ServiceKind::StopListening),
            Self::SendChatRequest { .. } => Some(ServiceKind::SendChatRequest),
            Self::LoadTranslation { .. } => Some(ServiceKind::LoadTranslation),
            Self::SpeakText { .. } => Some(ServiceKind::SpeakText),
            Self::StoreSessions { .. } => Some(ServiceKind::StoreSessions),
            Self::DropSessions { .. } => Some(ServiceKind::DropSessions),
            Self::LoadSettings | Self::Pause { .. } | Self::Rendered { .. } => None,
        }
    }

    /// Reads or writes the session archive. These run one at a time, in the
    /// order they were requested.
    pub fn touches_archive(&self) -> bool {
        matches!(
            self,
            Self::LoadSessions { .. } | Self::StoreSessions { .. } | Self::DropSessions { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadSettings => "load_settings",
            Self::Pause { .. } => "pause",
            Self::Rendered { .. } => "rendered",
            other => other.service().map(|s| s.name()).unwrap_or("unknown"),
        }
    }
}
