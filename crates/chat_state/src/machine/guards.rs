//! Guards - pure predicates over the session context

use chat_core::{ResponseType, DEFAULT_LANG};

use super::context::SessionContext;

/// A response may be spoken: there is text, speech is on, and it is not an image.
pub fn is_vocal(context: &SessionContext) -> bool {
    !context.response_text.is_empty()
        && !context.silent
        && context.response_type == ResponseType::Text
}

/// The response can be spoken without translating first.
pub fn is_default_lang(context: &SessionContext) -> bool {
    context.lang_code == DEFAULT_LANG
}

pub fn has_request_text(context: &SessionContext) -> bool {
    !context.request_text.trim().is_empty()
}

pub fn has_conversation(context: &SessionContext) -> bool {
    !context.answers.is_empty()
}
