//! State machine module
//!
//! Contains the session FSM: states, events, context, guards, actions and
//! the effects requested by each transition.

pub mod actions;
mod context;
mod effects;
mod events;
pub mod guards;
mod states;
mod transitions;

pub use context::{ChangeError, ContextChange, ContextPatch, SessionContext};
pub use effects::{Effect, ServiceKind, RESPONSE_PAUSE};
pub use events::SessionEvent;
pub use states::{
    Failure, IdlePhase, ListeningPhase, RequestPhase, ResponsePhase, SessionState, SpeakPhase,
};
pub use transitions::{transition, StateMachine, StateTransition, Step, TransitionError};
