//! chat_services - External services invoked by the chat session
//!
//! Each service is a trait so the owning loop can be driven by real HTTP
//! clients or by test doubles:
//! - `ChatGenerator` - text completions and image generation
//! - `Translator` - translation of the spoken response
//! - `SpeechRecognizer` / `SpeechSynthesizer` - voice capture and playback

pub mod error;
pub mod generation;
pub mod http;
pub mod speech;
pub mod translation;

pub use error::{Result, ServiceError};
pub use generation::{ChatGenerator, OpenAIGenerator};
pub use http::build_client;
pub use speech::{ChannelRecognizer, LogSynthesizer, SpeechRecognizer, SpeechSynthesizer, TranscriptFeed};
pub use translation::{HttpTranslator, IdentityTranslator, Translator};
