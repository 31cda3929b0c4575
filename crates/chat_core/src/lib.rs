//! chat_core - Core types for the voice chat client
//!
//! - `turn` - Conversation turns, response types and the session archive
//! - `settings` - Durable preferences, precision presets, language table
//! - `user` - Authenticated user reference
//! - `contract` - Input/output shapes of the external services
//! - `config` / `paths` - Configuration loading and file locations

pub mod config;
pub mod contract;
pub mod paths;
pub mod settings;
pub mod speech;
pub mod turn;
pub mod user;

pub use config::{Config, DEFAULT_API_BASE, DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_MODEL};
pub use contract::{
    ChatCompletion, ChatMessage, ChatRequest, ChatResult, CompletionChoice, CompletionMessage,
    GeneratedImage, ImageGeneration, TranslatedText, TranslationResult, UNPARSEABLE_RESPONSE,
};
pub use settings::{
    language_label, token_budget, translation_code, PrecisionPreset, SettingsSnapshot,
    COMPACT_TOKEN_EXPONENT, DEFAULT_LANG, LANGUAGES, MAX_TOKEN_EXPONENT, MIN_TOKEN_EXPONENT,
    PRECISION_PRESETS,
};
pub use speech::speakable_text;
pub use turn::{archive_key, image_markdown, Archive, ResponseType, Turn};
pub use user::UserRef;
