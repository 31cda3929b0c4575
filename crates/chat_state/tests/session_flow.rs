use chat_core::{
    Archive, ChatCompletion, ChatResult, CompletionChoice, CompletionMessage, GeneratedImage,
    ImageGeneration, ResponseType, TranslatedText, TranslationResult, Turn, UserRef,
    UNPARSEABLE_RESPONSE,
};
use chat_state::{
    ContextChange, Effect, IdlePhase, ListeningPhase, RequestPhase, ResponsePhase, ServiceKind,
    SessionEvent, SessionState, SpeakPhase, StateMachine,
};

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

fn ready_machine() -> StateMachine {
    let mut sm = StateMachine::default();
    sm.start();
    sm.handle_event(SessionEvent::SessionsLoaded {
        ticket: 1,
        sessions: Archive::new(),
    });
    assert_eq!(sm.state(), &SessionState::Idle(IdlePhase::Ready));
    sm
}

fn ask_text(sm: &mut StateMachine, question: &str) -> Vec<Effect> {
    sm.handle_event(SessionEvent::change(ContextChange::RequestText(
        question.to_string(),
    )));
    sm.handle_event(SessionEvent::text())
}

/// Ask `question`, answer it with `answer` and settle in `request.response.rendered`.
fn answered_turn(sm: &mut StateMachine, question: &str, answer: &str) {
    ask_text(sm, question);
    let ticket = sm.context().ticket;
    sm.handle_event(SessionEvent::ChatResponse {
        ticket,
        result: completion(answer),
    });
    sm.handle_event(SessionEvent::PauseElapsed);
    if sm.state() == &SessionState::Speak(SpeakPhase::SayText) {
        sm.handle_event(SessionEvent::Spoken);
        sm.handle_event(SessionEvent::PauseElapsed);
    }
    assert!(sm.state().matches("request.response.rendered"));
}

fn sent_request(effects: &[Effect]) -> &chat_core::ChatRequest {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::SendChatRequest { request, .. } => Some(request),
            _ => None,
        })
        .expect("a chat request should have been sent")
}

#[test]
fn quit_with_no_answers_persists_and_returns_to_idle() {
    let mut sm = ready_machine();
    ask_text(&mut sm, "hello");

    let effects = sm.handle_event(SessionEvent::Quit);
    assert_eq!(sm.state(), &SessionState::Persist);
    assert_eq!(
        effects,
        vec![Effect::StoreSessions {
            user: None,
            sessions: Archive::new(),
        }]
    );

    let effects = sm.handle_event(SessionEvent::SessionsStored {
        sessions: Archive::new(),
    });
    assert_eq!(sm.state(), &SessionState::Idle(IdlePhase::Loading));
    assert!(sm.context().answers.is_empty());
    assert_eq!(
        effects,
        vec![
            Effect::LoadSettings,
            Effect::LoadSessions {
                ticket: 2,
                user: None
            }
        ]
    );
}

#[test]
fn default_language_speaks_without_translating() {
    let mut sm = ready_machine();
    ask_text(&mut sm, "explain");
    sm.handle_event(SessionEvent::ChatResponse {
        ticket: 1,
        result: completion("Use `cargo` like so:\n```sh\ncargo run\n```\nDone."),
    });

    let effects = sm.handle_event(SessionEvent::PauseElapsed);
    assert_eq!(sm.state(), &SessionState::Speak(SpeakPhase::SayText));
    match effects.as_slice() {
        [Effect::SpeakText { text, lang_code }] => {
            assert_eq!(lang_code, "en-US");
            assert!(!text.contains('`'));
            assert!(!text.contains("cargo run"));
        }
        other => panic!("unexpected effects: {other:?}"),
    }

    sm.handle_event(SessionEvent::Spoken);
    assert!(sm.context().response_text.is_empty());
    assert!(sm.state().matches("request.response.pause"));

    let effects = sm.handle_event(SessionEvent::PauseElapsed);
    assert!(sm.state().matches("request.response.rendered"));
    assert!(matches!(
        effects.as_slice(),
        [Effect::Rendered { turn: Some(turn) }] if turn.question == "explain"
    ));
}

#[test]
fn other_languages_translate_before_speaking() {
    let mut sm = ready_machine();
    sm.handle_event(SessionEvent::change(ContextChange::LangCode(
        "es-ES".to_string(),
    )));
    ask_text(&mut sm, "hello");
    sm.handle_event(SessionEvent::ChatResponse {
        ticket: 1,
        result: completion("Hello!"),
    });

    let effects = sm.handle_event(SessionEvent::PauseElapsed);
    assert_eq!(sm.state(), &SessionState::Speak(SpeakPhase::Translate));
    assert_eq!(
        effects,
        vec![Effect::LoadTranslation {
            text: "Hello!".to_string(),
            lang_code: "es-ES".to_string(),
        }]
    );

    let mut result = TranslationResult::new();
    result.insert(
        "es".to_string(),
        TranslatedText {
            value: "¡Hola!".to_string(),
        },
    );
    let effects = sm.handle_event(SessionEvent::Translated { result });
    assert_eq!(sm.state(), &SessionState::Speak(SpeakPhase::SayText));
    assert_eq!(
        effects,
        vec![Effect::SpeakText {
            text: "¡Hola!".to_string(),
            lang_code: "es-ES".to_string(),
        }]
    );
}

#[test]
fn missing_translation_speaks_original_text() {
    let mut sm = ready_machine();
    sm.handle_event(SessionEvent::change(ContextChange::LangCode(
        "fr-FR".to_string(),
    )));
    ask_text(&mut sm, "hello");
    sm.handle_event(SessionEvent::ChatResponse {
        ticket: 1,
        result: completion("Hello!"),
    });
    sm.handle_event(SessionEvent::PauseElapsed);

    let effects = sm.handle_event(SessionEvent::Translated {
        result: TranslationResult::new(),
    });
    assert_eq!(
        effects,
        vec![Effect::SpeakText {
            text: "Hello!".to_string(),
            lang_code: "fr-FR".to_string(),
        }]
    );
}

#[test]
fn silent_and_image_responses_render_directly() {
    let mut sm = ready_machine();
    sm.handle_event(SessionEvent::change(ContextChange::Silent(true)));
    ask_text(&mut sm, "quiet please");
    sm.handle_event(SessionEvent::ChatResponse {
        ticket: 1,
        result: completion("ok"),
    });
    sm.handle_event(SessionEvent::PauseElapsed);
    assert!(sm.state().matches("request.response.rendered"));

    let mut sm = ready_machine();
    sm.handle_event(SessionEvent::change(ContextChange::ResponseType(
        ResponseType::Image,
    )));
    ask_text(&mut sm, "a red fox");
    sm.handle_event(SessionEvent::ChatResponse {
        ticket: 1,
        result: ChatResult::Image(ImageGeneration {
            data: vec![GeneratedImage {
                url: "https://img.example.com/fox.png".to_string(),
            }],
        }),
    });
    sm.handle_event(SessionEvent::PauseElapsed);
    assert!(sm.state().matches("request.response.rendered"));
    assert_eq!(
        sm.context().answers[0].answer,
        "![a red fox](https://img.example.com/fox.png)"
    );
}

#[test]
fn follow_up_sends_whole_conversation_oldest_first() {
    let mut sm = ready_machine();
    answered_turn(&mut sm, "first", "one");
    answered_turn(&mut sm, "second", "two");

    let effects = ask_text(&mut sm, "third");
    let request = sent_request(&effects);
    assert_eq!(request.conversation(), vec!["first", "second", "third"]);
    assert_eq!(request.messages().len(), 5);
}

#[test]
fn regeneration_sends_prefix_and_replaces_newer_turns() {
    let mut sm = ready_machine();
    answered_turn(&mut sm, "q0", "a0");
    answered_turn(&mut sm, "q1", "a1");
    answered_turn(&mut sm, "q2", "a2");

    // answers are newest first: [q2, q1, q0]; re-ask q1 with an edit
    sm.handle_event(SessionEvent::change(ContextChange::RequestText(
        "q1 edited".to_string(),
    )));
    let effects = sm.handle_event(SessionEvent::regenerate(1));
    let request = sent_request(&effects);
    assert_eq!(request.conversation(), vec!["q0", "q1 edited"]);

    let ticket = sm.context().ticket;
    sm.handle_event(SessionEvent::ChatResponse {
        ticket,
        result: completion("a1 again"),
    });
    let questions: Vec<_> = sm
        .context()
        .answers
        .iter()
        .map(|turn| turn.question.clone())
        .collect();
    assert_eq!(questions, vec!["q1 edited", "q0"]);
    assert_eq!(sm.context().start_index, None);
}

#[test]
fn archive_and_restore_round_trip() {
    let mut sm = ready_machine();
    answered_turn(&mut sm, "capital of France", "Paris");
    answered_turn(&mut sm, "and of Spain", "Madrid");
    let conversation: Vec<Turn> = sm.context().answers.clone();

    let effects = sm.handle_event(SessionEvent::Quit);
    let sessions = match effects.as_slice() {
        [Effect::StoreSessions { sessions, .. }] => sessions.clone(),
        other => panic!("unexpected effects: {other:?}"),
    };
    assert_eq!(sessions.get("capital of France"), Some(&conversation));

    sm.handle_event(SessionEvent::SessionsStored {
        sessions: sessions.clone(),
    });
    sm.handle_event(SessionEvent::SessionsLoaded {
        ticket: 2,
        sessions: sessions.clone(),
    });
    assert_eq!(sm.state(), &SessionState::Idle(IdlePhase::Ready));
    assert!(sm.context().answers.is_empty());

    let effects = sm.handle_event(SessionEvent::Restore {
        answers: sessions["capital of France"].clone(),
    });
    assert_eq!(sm.context().answers, conversation);
    assert!(sm.context().response_text.is_empty());
    assert_eq!(
        sm.state(),
        &SessionState::Request(RequestPhase::Response(ResponsePhase::Pause))
    );
    assert!(matches!(effects.as_slice(), [Effect::Pause { .. }]));
}

#[test]
fn empty_choices_keep_answers_and_set_sentinel() {
    let mut sm = ready_machine();
    answered_turn(&mut sm, "first", "one");
    ask_text(&mut sm, "second");
    sm.handle_event(SessionEvent::ChatResponse {
        ticket: 2,
        result: ChatResult::Completion(ChatCompletion { choices: vec![] }),
    });

    assert_eq!(sm.context().answers.len(), 1);
    assert_eq!(sm.context().response_text, UNPARSEABLE_RESPONSE);
    assert!(sm.state().matches("request.response.pause"));
}

#[test]
fn stale_chat_failure_is_ignored() {
    let mut sm = ready_machine();
    ask_text(&mut sm, "hello");

    let effects = sm.handle_event(SessionEvent::chat_failed(7, "timeout"));
    assert!(effects.is_empty());
    assert!(sm.state().matches("request.query"));
}

#[test]
fn failed_request_can_be_retried_or_dismissed() {
    let mut sm = ready_machine();
    ask_text(&mut sm, "hello");

    sm.handle_event(SessionEvent::chat_failed(1, "connection reset"));
    match sm.state() {
        SessionState::Failed(failure) => {
            assert_eq!(failure.service, ServiceKind::SendChatRequest);
            assert_eq!(failure.error, "connection reset");
        }
        other => panic!("expected failed, got {other}"),
    }

    let effects = sm.handle_event(SessionEvent::Retry);
    assert_eq!(
        sm.state(),
        &SessionState::Request(RequestPhase::Query { ticket: 2 })
    );
    assert_eq!(sent_request(&effects).prompt, "hello");

    sm.handle_event(SessionEvent::chat_failed(2, "connection reset"));
    let effects = sm.handle_event(SessionEvent::Dismiss);
    assert_eq!(sm.state(), &SessionState::Idle(IdlePhase::Ready));
    assert_eq!(effects, vec![Effect::LoadSettings]);
}

#[test]
fn session_load_failure_starts_with_empty_archive() {
    let mut sm = StateMachine::default();
    sm.start();
    sm.handle_event(SessionEvent::failed(
        ServiceKind::LoadSessions,
        "storage offline",
    ));
    assert_eq!(sm.state(), &SessionState::Idle(IdlePhase::Ready));
    assert!(sm.context().sessions.is_empty());
}

#[test]
fn voice_question_flows_into_request() {
    let mut sm = ready_machine();

    let effects = sm.handle_event(SessionEvent::Ask);
    assert_eq!(
        effects,
        vec![Effect::StartListening {
            lang_code: "en-US".to_string()
        }]
    );
    sm.handle_event(SessionEvent::ListeningStarted);
    assert_eq!(sm.state(), &SessionState::Listening(ListeningPhase::Talking));

    let effects = sm.handle_event(SessionEvent::Heard {
        transcript: "  what time is it ".to_string(),
    });
    assert_eq!(effects, vec![Effect::StopListening]);
    assert_eq!(sm.context().request_text, "what time is it");

    let effects = sm.handle_event(SessionEvent::ListeningStopped);
    assert!(sm.state().matches("request.query"));
    assert_eq!(sent_request(&effects).prompt, "what time is it");
}

#[test]
fn silence_after_stop_returns_without_request() {
    let mut sm = ready_machine();
    sm.handle_event(SessionEvent::Ask);
    sm.handle_event(SessionEvent::ListeningStarted);
    sm.handle_event(SessionEvent::Stop);

    let effects = sm.handle_event(SessionEvent::ListeningStopped);
    assert_eq!(sm.state(), &SessionState::Idle(IdlePhase::Ready));
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::SendChatRequest { .. })));
}

#[test]
fn blank_text_is_not_submitted() {
    let mut sm = ready_machine();
    sm.handle_event(SessionEvent::change(ContextChange::RequestText(
        "   ".to_string(),
    )));
    assert!(!sm.can_transition(&SessionEvent::text()));
    assert!(sm.handle_event(SessionEvent::text()).is_empty());
    assert_eq!(sm.state(), &SessionState::Idle(IdlePhase::Ready));
}

#[test]
fn drop_and_clear_reach_storage_from_any_state() {
    let mut sm = ready_machine();
    answered_turn(&mut sm, "keep me", "ok");
    sm.handle_event(SessionEvent::Quit);
    let mut sessions = Archive::new();
    sessions.insert("keep me".to_string(), Vec::new());
    sessions.insert("drop me".to_string(), Vec::new());
    sm.handle_event(SessionEvent::SessionsStored {
        sessions: sessions.clone(),
    });
    sm.handle_event(SessionEvent::SessionsLoaded {
        ticket: 2,
        sessions,
    });

    let effects = sm.handle_event(SessionEvent::Drop {
        question: "drop me".to_string(),
    });
    assert_eq!(sm.state(), &SessionState::Persist);
    match effects.as_slice() {
        [Effect::StoreSessions { sessions, .. }] => {
            assert!(sessions.contains_key("keep me"));
            assert!(!sessions.contains_key("drop me"));
        }
        other => panic!("unexpected effects: {other:?}"),
    }

    let effects = sm.handle_event(SessionEvent::Clear);
    assert_eq!(sm.state(), &SessionState::Clearing);
    assert_eq!(effects, vec![Effect::DropSessions { user: None }]);
}

#[test]
fn auth_reloads_sessions_for_user() {
    let mut sm = ready_machine();
    let user = UserRef::new("ada", "users/ada");

    let effects = sm.handle_event(SessionEvent::Auth {
        user: Some(user.clone()),
    });
    assert_eq!(sm.state(), &SessionState::Idle(IdlePhase::Loading));
    assert_eq!(
        effects,
        vec![
            Effect::LoadSettings,
            Effect::LoadSessions {
                ticket: 2,
                user: Some(user)
            }
        ]
    );
}

fn questions(sm: &StateMachine) -> Vec<String> {
    sm.context()
        .answers
        .iter()
        .map(|turn| turn.question.clone())
        .collect()
}

fn archive_of(question: &str) -> Archive {
    let mut archive = Archive::new();
    archive.insert(
        question.to_string(),
        vec![Turn::new(question, "answer", ResponseType::Text)],
    );
    archive
}

#[test]
fn dismissed_regeneration_leaves_follow_ups_appending() {
    let mut sm = ready_machine();
    answered_turn(&mut sm, "q0", "a0");
    answered_turn(&mut sm, "q1", "a1");
    answered_turn(&mut sm, "q2", "a2");

    sm.handle_event(SessionEvent::change(ContextChange::RequestText(
        "q0 edited".to_string(),
    )));
    sm.handle_event(SessionEvent::regenerate(2));
    let ticket = sm.context().ticket;
    sm.handle_event(SessionEvent::chat_failed(ticket, "upstream down"));
    assert!(sm.state().matches("failed"));

    sm.handle_event(SessionEvent::Dismiss);
    assert!(sm.state().matches("request.response.rendered"));
    assert_eq!(sm.context().start_index, None);

    let effects = ask_text(&mut sm, "q3");
    assert_eq!(
        sent_request(&effects).conversation(),
        vec!["q0", "q1", "q2", "q3"]
    );

    let ticket = sm.context().ticket;
    sm.handle_event(SessionEvent::ChatResponse {
        ticket,
        result: completion("a3"),
    });
    assert_eq!(questions(&sm), vec!["q3", "q2", "q1", "q0"]);
}

#[test]
fn plain_follow_up_clears_a_leftover_fork_point() {
    let mut sm = ready_machine();
    answered_turn(&mut sm, "q0", "a0");
    answered_turn(&mut sm, "q1", "a1");

    let mut context = sm.context().clone();
    context.start_index = Some(1);
    let mut sm = StateMachine::with_state(sm.state().clone(), context);

    let effects = ask_text(&mut sm, "q2");
    assert_eq!(sent_request(&effects).conversation(), vec!["q0", "q1", "q2"]);
    assert_eq!(sm.context().start_index, None);
}

#[test]
fn regeneration_past_the_conversation_is_rejected() {
    let mut sm = ready_machine();
    answered_turn(&mut sm, "only", "one");
    sm.handle_event(SessionEvent::change(ContextChange::RequestText(
        "again".to_string(),
    )));

    let effects = sm.handle_event(SessionEvent::regenerate(5));
    assert!(effects.is_empty());
    assert!(sm.state().matches("request.response.rendered"));
    assert_eq!(questions(&sm), vec!["only"]);
}

#[test]
fn auth_during_loading_ignores_the_earlier_load() {
    let mut sm = StateMachine::default();
    sm.start();
    let user = UserRef::new("ada", "ada-key");

    let effects = sm.handle_event(SessionEvent::Auth {
        user: Some(user.clone()),
    });
    assert!(effects.contains(&Effect::LoadSessions {
        ticket: 2,
        user: Some(user.clone())
    }));

    // The anonymous load started first and finishes first
    let effects = sm.handle_event(SessionEvent::SessionsLoaded {
        ticket: 1,
        sessions: archive_of("anon question"),
    });
    assert!(effects.is_empty());
    assert_eq!(sm.state(), &SessionState::Idle(IdlePhase::Loading));
    assert!(sm.context().sessions.is_empty());

    sm.handle_event(SessionEvent::SessionsLoaded {
        ticket: 2,
        sessions: archive_of("mine"),
    });
    assert_eq!(sm.state(), &SessionState::Idle(IdlePhase::Ready));

    answered_turn(&mut sm, "new", "fresh");
    match sm.handle_event(SessionEvent::Quit).as_slice() {
        [Effect::StoreSessions {
            user: Some(stored_for),
            sessions,
        }] => {
            assert_eq!(stored_for, &user);
            assert!(sessions.contains_key("mine"));
            assert!(sessions.contains_key("new"));
            assert!(!sessions.contains_key("anon question"));
        }
        other => panic!("unexpected effects: {other:?}"),
    }
}

#[test]
fn stale_load_failure_is_ignored() {
    let mut sm = StateMachine::default();
    sm.start();
    sm.handle_event(SessionEvent::Auth {
        user: Some(UserRef::new("ada", "ada-key")),
    });

    assert!(sm
        .handle_event(SessionEvent::load_failed(1, "local disk"))
        .is_empty());
    assert_eq!(sm.state(), &SessionState::Idle(IdlePhase::Loading));

    sm.handle_event(SessionEvent::load_failed(2, "remote offline"));
    assert_eq!(sm.state(), &SessionState::Idle(IdlePhase::Ready));
}

#[test]
fn leaving_listening_through_a_global_event_stops_capture() {
    let mut sm = ready_machine();
    answered_turn(&mut sm, "earlier", "answer");
    let conversation = sm.context().answers.clone();

    sm.handle_event(SessionEvent::Ask);
    sm.handle_event(SessionEvent::ListeningStarted);
    assert_eq!(sm.state(), &SessionState::Listening(ListeningPhase::Talking));

    let effects = sm.handle_event(SessionEvent::Restore {
        answers: conversation,
    });
    assert!(sm.state().matches("request.response.pause"));
    assert_eq!(
        effects,
        vec![
            Effect::StopListening,
            Effect::Pause {
                duration: chat_state::RESPONSE_PAUSE
            }
        ]
    );

    sm.handle_event(SessionEvent::Ask);
    let effects = sm.handle_event(SessionEvent::Clear);
    assert_eq!(sm.state(), &SessionState::Clearing);
    assert_eq!(
        effects,
        vec![Effect::StopListening, Effect::DropSessions { user: None }]
    );
}

#[test]
fn settings_change_while_listening_keeps_capture() {
    let mut sm = ready_machine();
    sm.handle_event(SessionEvent::Ask);
    sm.handle_event(SessionEvent::ListeningStarted);

    let effects = sm.handle_event(SessionEvent::change(ContextChange::Silent(true)));
    assert!(effects.is_empty());
    assert_eq!(sm.state(), &SessionState::Listening(ListeningPhase::Talking));
}

#[test]
fn drop_after_clear_keeps_the_archive_empty() {
    let mut sm = ready_machine();
    answered_turn(&mut sm, "keep me", "ok");
    sm.handle_event(SessionEvent::Quit);
    sm.handle_event(SessionEvent::SessionsStored {
        sessions: archive_of("keep me"),
    });
    sm.handle_event(SessionEvent::SessionsLoaded {
        ticket: 2,
        sessions: archive_of("keep me"),
    });

    sm.handle_event(SessionEvent::Clear);
    assert!(sm.context().sessions.is_empty());

    let effects = sm.handle_event(SessionEvent::Drop {
        question: "other".to_string(),
    });
    assert_eq!(
        effects,
        vec![Effect::StoreSessions {
            user: None,
            sessions: Archive::new(),
        }]
    );
}
