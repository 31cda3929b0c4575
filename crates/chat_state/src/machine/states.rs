//! Session states - the hierarchical state tree as nested tags
//!
//! Each top-level variant is one branch of the tree; child phases are
//! carried as inner enums so an event can only ever match one active leaf.

use serde::{Deserialize, Serialize};

use super::effects::ServiceKind;

/// Children of `idle`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdlePhase {
    /// Restoring the archive from storage.
    Loading,
    /// Waiting for `ASK` or `TEXT`.
    Ready,
}

/// Children of `listening`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListeningPhase {
    Start,
    Talking,
    Stopping,
}

/// Children of `request.response`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePhase {
    /// Short delay before deciding whether to speak.
    Pause,
    Rendered,
}

/// Children of `request`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase {
    /// A generation call is in flight under `ticket`.
    Query { ticket: u64 },
    Response(ResponsePhase),
}

/// Children of `speak`. `read_text` is transient and never rests.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpeakPhase {
    Translate,
    SayText,
}

/// Why the machine stopped and where `RETRY` picks up again.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub service: ServiceKind,
    pub error: String,
    pub resume: Box<SessionState>,
}

/// The active state of a chat session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle(IdlePhase),
    Listening(ListeningPhase),
    Request(RequestPhase),
    Speak(SpeakPhase),
    Persist,
    Clearing,
    Failed(Failure),
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle(IdlePhase::Loading)
    }
}

impl SessionState {
    /// Dotted path of the active leaf, e.g. `request.response.rendered`.
    pub fn path(&self) -> String {
        match self {
            Self::Idle(IdlePhase::Loading) => "idle.loading".into(),
            Self::Idle(IdlePhase::Ready) => "idle.ready".into(),
            Self::Listening(ListeningPhase::Start) => "listening.start".into(),
            Self::Listening(ListeningPhase::Talking) => "listening.talking".into(),
            Self::Listening(ListeningPhase::Stopping) => "listening.stopping".into(),
            Self::Request(RequestPhase::Query { .. }) => "request.query".into(),
            Self::Request(RequestPhase::Response(ResponsePhase::Pause)) => {
                "request.response.pause".into()
            }
            Self::Request(RequestPhase::Response(ResponsePhase::Rendered)) => {
                "request.response.rendered".into()
            }
            Self::Speak(SpeakPhase::Translate) => "speak.translate".into(),
            Self::Speak(SpeakPhase::SayText) => "speak.say_text".into(),
            Self::Persist => "persist".into(),
            Self::Clearing => "clearing".into(),
            Self::Failed(_) => "failed".into(),
        }
    }

    /// True when `path` names this state or one of its ancestors.
    pub fn matches(&self, path: &str) -> bool {
        let own = self.path();
        own == path
            || own
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with('.'))
    }

    /// The service this state is waiting on, if any.
    pub fn invoked_service(&self) -> Option<ServiceKind> {
        match self {
            Self::Idle(IdlePhase::Loading) => Some(ServiceKind::LoadSessions),
            Self::Listening(ListeningPhase::Start) => Some(ServiceKind::StartListening),
            Self::Listening(ListeningPhase::Stopping) => Some(ServiceKind::StopListening),
            Self::Request(RequestPhase::Query { .. }) => Some(ServiceKind::SendChatRequest),
            Self::Speak(SpeakPhase::Translate) => Some(ServiceKind::LoadTranslation),
            Self::Speak(SpeakPhase::SayText) => Some(ServiceKind::SpeakText),
            Self::Persist => Some(ServiceKind::StoreSessions),
            Self::Clearing => Some(ServiceKind::DropSessions),
            _ => None,
        }
    }

    /// Ticket of the generation call in flight.
    pub fn in_flight_ticket(&self) -> Option<u64> {
        match self {
            Self::Request(RequestPhase::Query { ticket }) => Some(*ticket),
            _ => None,
        }
    }

    /// Whether a new question can be submitted right now.
    pub fn accepts_request(&self) -> bool {
        matches!(
            self,
            Self::Idle(_) | Self::Request(RequestPhase::Response(_))
        )
    }

    pub fn is_busy(&self) -> bool {
        self.invoked_service().is_some()
    }

    /// Human-readable status line.
    pub fn description(&self) -> &str {
        match self {
            Self::Idle(IdlePhase::Loading) => "Loading saved conversations",
            Self::Idle(IdlePhase::Ready) => "Type or speak a question",
            Self::Listening(ListeningPhase::Talking) => "Listening",
            Self::Listening(_) => "Preparing microphone",
            Self::Request(RequestPhase::Query { .. }) => "Waiting for answer",
            Self::Request(RequestPhase::Response(_)) => "Ready for follow-up",
            Self::Speak(SpeakPhase::Translate) => "Translating",
            Self::Speak(SpeakPhase::SayText) => "Speaking",
            Self::Persist => "Saving conversation",
            Self::Clearing => "Clearing history",
            Self::Failed(_) => "Something went wrong",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}
