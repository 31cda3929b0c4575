//! chat_state - Session state machine for voice and text chat
//!
//! This crate provides the pure transition table that drives a chat
//! session through listening, requesting, speaking and persisting, plus
//! the context model and the effects the owning loop must run.

pub mod machine;

// Re-export commonly used types
pub use machine::{
    transition, ChangeError, ContextChange, ContextPatch, Effect, Failure, IdlePhase,
    ListeningPhase, RequestPhase, ResponsePhase, ServiceKind, SessionContext, SessionEvent,
    SessionState, SpeakPhase, StateMachine, StateTransition, Step, TransitionError,
    RESPONSE_PAUSE,
};
