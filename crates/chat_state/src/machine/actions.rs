//! Actions - pure `(context, event data) -> ContextPatch` reducers

use chat_core::{
    archive_key, image_markdown, translation_code, Archive, ChatResult, ResponseType,
    SettingsSnapshot, TranslationResult, Turn, UserRef, UNPARSEABLE_RESPONSE,
};
use chrono::{DateTime, Utc};

use super::context::{ContextChange, ContextPatch, SessionContext};

/// Clear the active conversation.
pub fn reset_session(_context: &SessionContext) -> ContextPatch {
    ContextPatch {
        answers: Some(Vec::new()),
        ..Default::default()
    }
}

/// Archive the active conversation under its first question.
///
/// No-op when there is nothing to archive.
pub fn commit_session(context: &SessionContext) -> ContextPatch {
    let Some(key) = archive_key(&context.answers) else {
        return ContextPatch::default();
    };
    let mut sessions = context.sessions.clone();
    sessions.insert(key.to_string(), context.answers.clone());
    ContextPatch {
        sessions: Some(sessions),
        answers: Some(Vec::new()),
        request_text: Some(String::new()),
        response_text: Some(String::new()),
        ..Default::default()
    }
}

/// Remove one archived conversation and clear the active one.
pub fn drop_session(context: &SessionContext, question: &str) -> ContextPatch {
    let mut sessions = context.sessions.clone();
    sessions.remove(question);
    ContextPatch {
        sessions: Some(sessions),
        answers: Some(Vec::new()),
        ..Default::default()
    }
}

pub fn assign_heard(transcript: &str) -> ContextPatch {
    ContextPatch {
        request_text: Some(transcript.trim().to_string()),
        ..Default::default()
    }
}

/// Start an archive load under a fresh ticket.
pub fn begin_load(context: &SessionContext) -> ContextPatch {
    ContextPatch {
        load_ticket: Some(context.load_ticket.wrapping_add(1)),
        ..Default::default()
    }
}

/// Start a request: stamp the time, issue the next ticket, stop editing.
pub fn begin_query(context: &SessionContext, now: DateTime<Utc>) -> ContextPatch {
    ContextPatch {
        timestamp: Some(Some(now)),
        ticket: Some(context.ticket.wrapping_add(1)),
        editing: Some(None),
        ..Default::default()
    }
}

/// Turn a generation result into a new turn at the front of `answers`.
///
/// An unusable result only sets `responseText` to the sentinel. When the
/// request was a regeneration, turns newer than the fork point and the
/// forked turn itself are replaced by the new turn.
pub fn assign_response(
    context: &SessionContext,
    result: &ChatResult,
    now: DateTime<Utc>,
) -> ContextPatch {
    let parsed = match result {
        ChatResult::Image(generation) => generation.data.first().map(|image| {
            (
                image_markdown(&context.request_text, &image.url),
                image.url.clone(),
                None,
                ResponseType::Image,
            )
        }),
        ChatResult::Completion(completion) => completion.choices.first().and_then(|choice| {
            choice.message.content.as_ref().map(|content| {
                (
                    content.clone(),
                    content.clone(),
                    choice.finish_reason.clone(),
                    ResponseType::Text,
                )
            })
        }),
    };

    let Some((answer, response_text, finish_reason, response_type)) = parsed else {
        return ContextPatch {
            response_text: Some(UNPARSEABLE_RESPONSE.to_string()),
            start_index: Some(None),
            timestamp: Some(None),
            ..Default::default()
        };
    };

    let elapsed = context
        .timestamp
        .map(|started| (now - started).num_milliseconds().max(0) as u64)
        .unwrap_or_default();

    let turn = Turn::new(context.request_text.clone(), answer, response_type)
        .with_finish_reason(finish_reason)
        .with_response_time(elapsed);

    let kept = match context.start_index {
        Some(index) if index < context.answers.len() => &context.answers[index + 1..],
        _ => &context.answers[..],
    };
    let mut answers = Vec::with_capacity(kept.len() + 1);
    answers.push(turn);
    answers.extend_from_slice(kept);

    ContextPatch {
        answers: Some(answers),
        response_text: Some(response_text),
        request_text: Some(String::new()),
        start_index: Some(None),
        timestamp: Some(None),
        ..Default::default()
    }
}

/// Replace `responseText` with the translation for the active language.
///
/// Returns an empty patch when the result has no matching entry.
pub fn assign_translate(context: &SessionContext, result: &TranslationResult) -> ContextPatch {
    match result.get(translation_code(&context.lang_code)) {
        Some(translated) => ContextPatch {
            response_text: Some(translated.value.clone()),
            ..Default::default()
        },
        None => ContextPatch::default(),
    }
}

pub fn clear_response_text() -> ContextPatch {
    ContextPatch {
        response_text: Some(String::new()),
        ..Default::default()
    }
}

/// Generic single-property setter.
pub fn apply_changes(change: &ContextChange) -> ContextPatch {
    let mut patch = ContextPatch::default();
    match change.clone() {
        ContextChange::RequestText(text) => patch.request_text = Some(text),
        ContextChange::ResponseType(response_type) => patch.response_type = Some(response_type),
        ContextChange::TemperatureIndex(index) => patch.temperature_index = Some(index),
        ContextChange::MaxTokens(exp) => patch.max_tokens = Some(exp),
        ContextChange::LangCode(code) => patch.lang_code = Some(code),
        ContextChange::Silent(silent) => patch.silent = Some(silent),
        ContextChange::Editing(id) => patch.editing = Some(id),
        ContextChange::Answers(answers) => patch.answers = Some(answers),
    }
    patch
}

/// Record the fork point of a regeneration; `None` makes the next request
/// a plain follow-up.
pub fn assign_index(index: Option<usize>) -> ContextPatch {
    ContextPatch {
        start_index: Some(index),
        ..Default::default()
    }
}

/// Forget the request that was given up on.
pub fn abandon_request() -> ContextPatch {
    ContextPatch {
        start_index: Some(None),
        timestamp: Some(None),
        ..Default::default()
    }
}

pub fn assign_restore(answers: &[Turn]) -> ContextPatch {
    ContextPatch {
        answers: Some(answers.to_vec()),
        response_text: Some(String::new()),
        start_index: Some(None),
        editing: Some(None),
        ..Default::default()
    }
}

pub fn assign_user(user: Option<&UserRef>) -> ContextPatch {
    ContextPatch {
        user: Some(user.cloned()),
        ..Default::default()
    }
}

pub fn assign_sessions(sessions: &Archive) -> ContextPatch {
    ContextPatch {
        sessions: Some(sessions.clone()),
        ..Default::default()
    }
}

pub fn assign_settings(settings: &SettingsSnapshot) -> ContextPatch {
    let settings = settings.clone().sanitized();
    ContextPatch {
        response_type: Some(settings.response_type),
        temperature_index: Some(settings.temperature_index),
        max_tokens: Some(settings.max_tokens),
        lang_code: Some(settings.lang_code),
        silent: Some(settings.silent),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use chat_core::{
        ChatCompletion, CompletionChoice, CompletionMessage, GeneratedImage, ImageGeneration,
        TranslatedText,
    };
    use chrono::Duration;

    use super::*;

    fn turn(question: &str) -> Turn {
        Turn::new(question, format!("answer to {question}"), ResponseType::Text)
    }

    fn context_with(questions: &[&str]) -> SessionContext {
        let mut context = SessionContext::new();
        context.answers = questions.iter().map(|q| turn(q)).collect();
        context
    }

    fn completion(content: &str) -> ChatResult {
        ChatResult::Completion(ChatCompletion {
            choices: vec![CompletionChoice {
                message: CompletionMessage {
                    role: Some("assistant".to_string()),
                    content: Some(content.to_string()),
                },
                finish_reason: Some("stop".to_string()),
            }],
        })
    }

    #[test]
    fn commit_archives_under_oldest_question() {
        let mut context = context_with(&["newest", "middle", "oldest"]);
        let answers = context.answers.clone();
        context.apply(commit_session(&context));

        assert!(context.answers.is_empty());
        assert_eq!(context.sessions.get("oldest"), Some(&answers));
        assert_eq!(context.sessions.len(), 1);
    }

    #[test]
    fn commit_with_no_answers_is_noop() {
        let context = SessionContext::new();
        assert!(commit_session(&context).is_empty());
    }

    #[test]
    fn commit_overwrites_same_first_question() {
        let mut context = context_with(&["b", "same"]);
        context.apply(commit_session(&context));
        context.answers = vec![turn("c"), turn("same")];
        let second = context.answers.clone();
        context.apply(commit_session(&context));
        assert_eq!(context.sessions.len(), 1);
        assert_eq!(context.sessions["same"], second);
    }

    #[test]
    fn drop_removes_entry_and_clears_answers() {
        let mut context = context_with(&["x"]);
        context.sessions.insert("gone".to_string(), vec![turn("gone")]);
        context.sessions.insert("kept".to_string(), vec![turn("kept")]);
        context.apply(drop_session(&context, "gone"));
        assert!(context.answers.is_empty());
        assert!(context.sessions.contains_key("kept"));
        assert!(!context.sessions.contains_key("gone"));
    }

    #[test]
    fn text_response_prepends_turn() {
        let mut context = context_with(&["earlier"]);
        let started = Utc::now();
        context.request_text = "why".to_string();
        context.timestamp = Some(started);

        context.apply(assign_response(
            &context,
            &completion("because"),
            started + Duration::milliseconds(250),
        ));

        assert_eq!(context.answers.len(), 2);
        let newest = &context.answers[0];
        assert_eq!(newest.question, "why");
        assert_eq!(newest.answer, "because");
        assert_eq!(newest.finish_reason.as_deref(), Some("stop"));
        assert_eq!(newest.response_time_ms, 250);
        assert_eq!(context.response_text, "because");
        assert!(context.request_text.is_empty());
        assert!(context.timestamp.is_none());
    }

    #[test]
    fn image_response_builds_markdown() {
        let mut context = SessionContext::new();
        context.response_type = ResponseType::Image;
        context.request_text = "a lighthouse".to_string();
        let url = "https://cdn.example.com/img-1.png";
        let result = ChatResult::Image(ImageGeneration {
            data: vec![GeneratedImage {
                url: url.to_string(),
            }],
        });

        context.apply(assign_response(&context, &result, Utc::now()));

        assert_eq!(context.answers[0].answer, format!("![a lighthouse]({url})"));
        assert_eq!(context.answers[0].response_type, ResponseType::Image);
        assert_eq!(context.response_text, url);
    }

    #[test]
    fn empty_choices_sets_sentinel_without_turn() {
        let mut context = context_with(&["only"]);
        context.request_text = "hello".to_string();
        let result = ChatResult::Completion(ChatCompletion { choices: vec![] });

        context.apply(assign_response(&context, &result, Utc::now()));

        assert_eq!(context.response_text, UNPARSEABLE_RESPONSE);
        assert_eq!(context.answers.len(), 1);
        assert_eq!(context.request_text, "hello");
    }

    #[test]
    fn regeneration_replaces_forked_turn_and_newer() {
        let mut context = context_with(&["q3", "q2", "q1", "q0"]);
        context.request_text = "q1 edited".to_string();
        context.apply(assign_index(Some(2)));

        context.apply(assign_response(&context, &completion("fresh"), Utc::now()));

        let questions: Vec<_> = context.answers.iter().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["q1 edited", "q0"]);
        assert_eq!(context.start_index, None);
    }

    #[test]
    fn translate_picks_two_letter_entry() {
        let mut context = SessionContext::new();
        context.lang_code = "es-ES".to_string();
        context.response_text = "hello".to_string();
        let mut result = TranslationResult::new();
        result.insert(
            "es".to_string(),
            TranslatedText {
                value: "hola".to_string(),
            },
        );

        context.apply(assign_translate(&context, &result));
        assert_eq!(context.response_text, "hola");

        context.lang_code = "fr-FR".to_string();
        assert!(assign_translate(&context, &result).is_empty());
    }

    #[test]
    fn begin_query_advances_ticket_and_stops_editing() {
        let mut context = SessionContext::new();
        context.editing = Some("turn-1".to_string());
        let now = Utc::now();
        context.apply(begin_query(&context, now));
        assert_eq!(context.ticket, 1);
        assert_eq!(context.timestamp, Some(now));
        assert_eq!(context.editing, None);
    }

    #[test]
    fn abandoned_request_forgets_fork_point() {
        let mut context = context_with(&["q1", "q0"]);
        context.apply(assign_index(Some(1)));
        context.timestamp = Some(Utc::now());

        context.apply(abandon_request());
        assert_eq!(context.start_index, None);
        assert!(context.timestamp.is_none());
        assert_eq!(context.answers.len(), 2);
    }

    #[test]
    fn begin_load_advances_load_ticket_only() {
        let mut context = SessionContext::new();
        context.apply(begin_load(&context));
        context.apply(begin_load(&context));
        assert_eq!(context.load_ticket, 2);
        assert_eq!(context.ticket, 0);
    }

    #[test]
    fn apply_changes_sets_single_field() {
        let mut context = SessionContext::new();
        context.apply(apply_changes(&ContextChange::LangCode("de-DE".to_string())));
        assert_eq!(context.lang_code, "de-DE");
        assert_eq!(context.temperature_index, 1);
    }
}
