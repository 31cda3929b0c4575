//! State transitions - the session transition table
//!
//! `transition` is pure: it maps `(state, context, event)` to the next state,
//! the next context and the effects to run. `StateMachine` owns the current
//! state and context and keeps a bounded transition history.

use chat_core::{speakable_text, Archive};
use chrono::Utc;
use thiserror::Error;

use super::actions::{
    abandon_request, apply_changes, assign_heard, assign_index, assign_response,
    assign_restore, assign_sessions, assign_settings, assign_translate, assign_user,
    begin_load, begin_query, clear_response_text, commit_session, drop_session, reset_session,
};
use super::context::{ChangeError, ContextPatch, SessionContext};
use super::effects::{Effect, ServiceKind, RESPONSE_PAUSE};
use super::events::SessionEvent;
use super::guards::{has_conversation, has_request_text, is_default_lang, is_vocal};
use super::states::{
    Failure, IdlePhase, ListeningPhase, RequestPhase, ResponsePhase, SessionState, SpeakPhase,
};

/// Error type for rejected events.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("Event {event} is not accepted in state {from}")]
    InvalidTransition {
        from: SessionState,
        event: &'static str,
    },

    #[error("Invalid change: {0}")]
    InvalidChange(#[from] ChangeError),

    #[error("Cannot regenerate from answer {index}, the conversation has {len}")]
    InvalidForkPoint { index: usize, len: usize },
}

/// Result of a single accepted event.
#[derive(Debug, Clone)]
pub struct Step {
    pub state: SessionState,
    pub context: SessionContext,
    pub effects: Vec<Effect>,
}

/// Accumulates context patches and effects while a transition runs,
/// including the entry actions of every state it enters.
struct StepBuilder {
    context: SessionContext,
    effects: Vec<Effect>,
}

impl StepBuilder {
    fn new(context: &SessionContext) -> Self {
        Self {
            context: context.clone(),
            effects: Vec::new(),
        }
    }

    fn patch(&mut self, patch: ContextPatch) {
        self.context.apply(patch);
    }

    /// Enter `target` from outside, running its entry actions and invocations.
    fn enter(&mut self, target: SessionState) -> SessionState {
        match target {
            SessionState::Idle(phase) => {
                let reset = reset_session(&self.context);
                self.patch(reset);
                self.effects.push(Effect::LoadSettings);
                if phase == IdlePhase::Loading {
                    let load = begin_load(&self.context);
                    self.patch(load);
                    self.effects.push(Effect::LoadSessions {
                        ticket: self.context.load_ticket,
                        user: self.context.user.clone(),
                    });
                }
                SessionState::Idle(phase)
            }
            SessionState::Listening(ListeningPhase::Start) => {
                self.effects.push(Effect::StartListening {
                    lang_code: self.context.lang_code.clone(),
                });
                target
            }
            SessionState::Listening(ListeningPhase::Stopping) => {
                self.effects.push(Effect::StopListening);
                target
            }
            SessionState::Request(RequestPhase::Query { .. }) => {
                let begin = begin_query(&self.context, Utc::now());
                self.patch(begin);
                let ticket = self.context.ticket;
                self.effects.push(Effect::SendChatRequest {
                    ticket,
                    request: self.context.chat_request(),
                });
                SessionState::Request(RequestPhase::Query { ticket })
            }
            SessionState::Request(RequestPhase::Response(ResponsePhase::Pause)) => {
                self.effects.push(Effect::Pause {
                    duration: RESPONSE_PAUSE,
                });
                target
            }
            SessionState::Request(RequestPhase::Response(ResponsePhase::Rendered)) => {
                self.effects.push(Effect::Rendered {
                    turn: self.context.answers.first().cloned(),
                });
                target
            }
            SessionState::Speak(SpeakPhase::Translate) => {
                self.effects.push(Effect::LoadTranslation {
                    text: speakable_text(&self.context.response_text),
                    lang_code: self.context.lang_code.clone(),
                });
                target
            }
            SessionState::Speak(SpeakPhase::SayText) => {
                self.effects.push(Effect::SpeakText {
                    text: speakable_text(&self.context.response_text),
                    lang_code: self.context.lang_code.clone(),
                });
                target
            }
            SessionState::Persist => {
                self.effects.push(Effect::StoreSessions {
                    user: self.context.user.clone(),
                    sessions: self.context.sessions.clone(),
                });
                target
            }
            SessionState::Clearing => {
                self.patch(assign_sessions(&Archive::new()));
                self.effects.push(Effect::DropSessions {
                    user: self.context.user.clone(),
                });
                target
            }
            SessionState::Listening(ListeningPhase::Talking) | SessionState::Failed(_) => target,
        }
    }

    /// `speak.read_text`: translate first unless already in the default language.
    fn read_text(&mut self) -> SessionState {
        if is_default_lang(&self.context) {
            self.enter(SessionState::Speak(SpeakPhase::SayText))
        } else {
            self.enter(SessionState::Speak(SpeakPhase::Translate))
        }
    }

    /// Where to land when there is nothing to do: the conversation if one is
    /// active, otherwise idle.
    fn settle(&mut self) -> SessionState {
        if has_conversation(&self.context) {
            self.enter(SessionState::Request(RequestPhase::Response(
                ResponsePhase::Rendered,
            )))
        } else {
            self.enter(SessionState::Idle(IdlePhase::Ready))
        }
    }

    fn query(&mut self) -> SessionState {
        self.enter(SessionState::Request(RequestPhase::Query { ticket: 0 }))
    }

    /// Stop capture first when `to` abandons a running capture session.
    fn exit_capture(&mut self, from: &SessionState, to: &SessionState) {
        let capturing = matches!(
            from,
            SessionState::Listening(ListeningPhase::Start | ListeningPhase::Talking)
        );
        if capturing && !matches!(to, SessionState::Listening(_) | SessionState::Failed(_)) {
            self.effects.insert(0, Effect::StopListening);
        }
    }

    fn finish(self, state: SessionState) -> Step {
        Step {
            state,
            context: self.context,
            effects: self.effects,
        }
    }
}

/// A regeneration index must name a turn of the active conversation.
fn fork_point(
    context: &SessionContext,
    index: Option<usize>,
) -> Result<Option<usize>, TransitionError> {
    match index {
        Some(index) if index >= context.answers.len() => Err(TransitionError::InvalidForkPoint {
            index,
            len: context.answers.len(),
        }),
        index => Ok(index),
    }
}

/// Compute the next state, context and effects for `event`.
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: &SessionEvent,
) -> Result<Step, TransitionError> {
    use SessionEvent as E;
    use SessionState as S;

    let mut step = StepBuilder::new(context);

    let next = match (state, event) {
        // ========== Global ==========
        (_, E::Change { change }) => {
            change.validate()?;
            step.patch(apply_changes(change));
            state.clone()
        }
        (_, E::SettingsLoaded { settings }) => {
            if let Some(settings) = settings {
                step.patch(assign_settings(settings));
            }
            state.clone()
        }
        (_, E::Restore { answers }) => {
            step.patch(assign_restore(answers));
            step.enter(S::Request(RequestPhase::Response(ResponsePhase::Pause)))
        }
        (_, E::Auth { user }) => {
            step.patch(assign_user(user.as_ref()));
            step.enter(S::Idle(IdlePhase::Loading))
        }
        (_, E::Clear) => step.enter(S::Clearing),
        (_, E::Drop { question }) => {
            let dropped = drop_session(&step.context, question);
            step.patch(dropped);
            step.enter(S::Persist)
        }

        // ========== Idle ==========
        (S::Idle(IdlePhase::Loading), E::SessionsLoaded { ticket, sessions })
            if *ticket == context.load_ticket =>
        {
            step.patch(assign_sessions(sessions));
            S::Idle(IdlePhase::Ready)
        }
        (
            S::Idle(IdlePhase::Loading),
            E::ServiceFailed {
                service: ServiceKind::LoadSessions,
                error,
                ticket,
            },
        ) if ticket.map_or(true, |ticket| ticket == context.load_ticket) => {
            tracing::warn!("Failed to load archived sessions, starting empty: {}", error);
            step.patch(assign_sessions(&Archive::new()));
            S::Idle(IdlePhase::Ready)
        }
        (S::Idle(IdlePhase::Ready), E::Ask) => step.enter(S::Listening(ListeningPhase::Start)),
        (S::Idle(_), E::Text { index }) if has_request_text(context) => {
            let fork = fork_point(context, *index)?;
            step.patch(assign_index(fork));
            step.query()
        }

        // ========== Listening ==========
        (S::Listening(ListeningPhase::Start), E::ListeningStarted) => {
            S::Listening(ListeningPhase::Talking)
        }
        // Capture came up after the machine already left listening
        (current, E::ListeningStarted) if !matches!(current, S::Listening(_)) => {
            step.effects.push(Effect::StopListening);
            current.clone()
        }
        (S::Listening(ListeningPhase::Talking), E::Heard { transcript }) => {
            step.patch(assign_heard(transcript));
            step.enter(S::Listening(ListeningPhase::Stopping))
        }
        (S::Listening(ListeningPhase::Talking), E::Stop) => {
            step.enter(S::Listening(ListeningPhase::Stopping))
        }
        (S::Listening(ListeningPhase::Stopping), E::ListeningStopped) => {
            if has_request_text(&step.context) {
                step.query()
            } else {
                step.settle()
            }
        }

        // ========== Request ==========
        (S::Request(_), E::Quit) => {
            let committed = commit_session(&step.context);
            step.patch(committed);
            step.enter(S::Persist)
        }
        (
            S::Request(RequestPhase::Query { ticket }),
            E::ChatResponse {
                ticket: received,
                result,
            },
        ) if ticket == received => {
            let response = assign_response(&step.context, result, Utc::now());
            step.patch(response);
            step.enter(S::Request(RequestPhase::Response(ResponsePhase::Pause)))
        }
        (S::Request(RequestPhase::Response(_)), E::Ask) => {
            step.enter(S::Listening(ListeningPhase::Start))
        }
        (S::Request(RequestPhase::Response(_)), E::Text { index })
            if has_request_text(context) =>
        {
            let fork = fork_point(context, *index)?;
            step.patch(assign_index(fork));
            step.query()
        }
        (S::Request(RequestPhase::Response(ResponsePhase::Pause)), E::PauseElapsed) => {
            if is_vocal(&step.context) {
                step.read_text()
            } else {
                step.enter(S::Request(RequestPhase::Response(ResponsePhase::Rendered)))
            }
        }

        // ========== Speak ==========
        (S::Speak(SpeakPhase::Translate), E::Translated { result }) => {
            let translated = assign_translate(&step.context, result);
            if translated.is_empty() {
                tracing::warn!(
                    "No translation for {}, speaking the original text",
                    step.context.lang_code
                );
            }
            step.patch(translated);
            step.enter(S::Speak(SpeakPhase::SayText))
        }
        (S::Speak(SpeakPhase::SayText), E::Spoken) => {
            step.patch(clear_response_text());
            step.enter(S::Request(RequestPhase::Response(ResponsePhase::Pause)))
        }

        // ========== Persistence ==========
        (S::Persist, E::SessionsStored { sessions }) => {
            step.patch(assign_sessions(sessions));
            step.enter(S::Idle(IdlePhase::Loading))
        }
        (S::Clearing, E::SessionsDropped { sessions }) => {
            step.patch(assign_sessions(sessions));
            step.enter(S::Idle(IdlePhase::Loading))
        }

        // ========== Failure and Recovery ==========
        (
            current,
            E::ServiceFailed {
                service,
                error,
                ticket,
            },
        ) if current.invoked_service() == Some(*service)
            && (ticket.is_none() || *ticket == current.in_flight_ticket()) =>
        {
            S::Failed(Failure {
                service: *service,
                error: error.clone(),
                resume: Box::new(current.clone()),
            })
        }
        (S::Failed(failure), E::Retry) => step.enter((*failure.resume).clone()),
        (S::Failed(_), E::Dismiss) => {
            step.patch(abandon_request());
            step.settle()
        }

        // ========== Default: not accepted ==========
        _ => {
            return Err(TransitionError::InvalidTransition {
                from: state.clone(),
                event: event.name(),
            })
        }
    };

    step.exit_capture(state, &next);
    Ok(step.finish(next))
}

/// Record of one handled event.
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// The state before the transition.
    pub from: SessionState,
    /// The state after the transition.
    pub to: SessionState,
    /// Name of the event that triggered the transition.
    pub event: &'static str,
    /// Whether the event was accepted by the active state.
    pub accepted: bool,
    /// Whether the state actually changed.
    pub changed: bool,
}

/// State machine owning the session state and context.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current_state: SessionState,
    context: SessionContext,
    history: Vec<StateTransition>,
    max_history: usize,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new(SessionContext::default())
    }
}

impl StateMachine {
    /// Create a machine parked at `idle.loading`. Call `start` to get the
    /// initial entry effects.
    pub fn new(context: SessionContext) -> Self {
        Self {
            current_state: SessionState::default(),
            context,
            history: Vec::new(),
            max_history: 50,
        }
    }

    /// Create a state machine with a specific initial state.
    pub fn with_state(state: SessionState, context: SessionContext) -> Self {
        Self {
            current_state: state,
            ..Self::new(context)
        }
    }

    /// Enter the initial state and return its effects.
    pub fn start(&mut self) -> Vec<Effect> {
        let mut step = StepBuilder::new(&self.context);
        let state = step.enter(SessionState::Idle(IdlePhase::Loading));
        let step = step.finish(state);
        self.current_state = step.state;
        self.context = step.context;
        step.effects
    }

    pub fn state(&self) -> &SessionState {
        &self.current_state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Get the transition history.
    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Handle an event, ignoring it when the active state does not accept it.
    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<Effect> {
        match self.try_handle_event(event) {
            Ok(effects) => effects,
            Err(TransitionError::InvalidTransition { from, event }) => {
                tracing::trace!("Ignoring {} in {}", event, from);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Rejected event: {}", e);
                Vec::new()
            }
        }
    }

    /// Handle an event, reporting rejection as an error.
    pub fn try_handle_event(&mut self, event: SessionEvent) -> Result<Vec<Effect>, TransitionError> {
        let from = self.current_state.clone();
        let name = event.name();

        let result = transition(&self.current_state, &self.context, &event);
        let (to, accepted, effects) = match result {
            Ok(step) => {
                self.context = step.context;
                self.current_state = step.state;
                (self.current_state.clone(), true, Ok(step.effects))
            }
            Err(e) => (from.clone(), false, Err(e)),
        };

        let changed = from != to;
        if accepted {
            tracing::debug!("{}: {} -> {}", name, from, to);
        }

        self.history.push(StateTransition {
            from,
            to,
            event: name,
            accepted,
            changed,
        });
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }

        effects
    }

    /// Check if the active state accepts `event` without executing it.
    pub fn can_transition(&self, event: &SessionEvent) -> bool {
        transition(&self.current_state, &self.context, event).is_ok()
    }
}
