//! chat_loop - The owning loop of a chat session
//!
//! Feeds events to the state machine one at a time, runs the effects each
//! transition requests as tracked tokio tasks, and turns their outcomes
//! back into events.

pub mod config;
pub mod error;
pub mod runtime;
pub mod services;

pub use config::LoopConfig;
pub use error::{LoopError, Result};
pub use runtime::{SessionHandle, SessionRuntime, SessionUpdate};
pub use services::SessionServices;
