//! Terminal commands and their mapping to session events

use chat_state::{ChangeError, ContextChange, SessionEvent};
use thiserror::Error;

pub const HELP: &str = "\
Type a question and press enter to ask it.
While listening, typed lines are treated as dictated speech.

  /ask                 start listening
  /stop                stop listening
  /regen <n> [text]    regenerate from answer n (0 is the newest), optionally edited
  /quit                archive the conversation
  /sessions            list archived conversations
  /restore <question>  reopen an archived conversation
  /drop <question>     delete an archived conversation
  /clear               delete all archived conversations
  /set <key> <value>   change a setting (responseType, temperatureIndex, max_tokens, lang_code, silent)
  /login <name> [key]  sign in, optionally with a storage key
  /logout              sign out
  /retry, /dismiss     recover from a failed request
  /help                show this help
  /exit                leave";

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("Unknown command /{0}, try /help")]
    Unknown(String),

    #[error("/{command} needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("'{0}' is not an answer number")]
    InvalidIndex(String),

    #[error(transparent)]
    Change(#[from] ChangeError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A typed question, or dictation while listening.
    Input(String),
    Event(SessionEvent),
    Regenerate { index: usize, text: Option<String> },
    Restore(String),
    Sessions,
    Help,
    Exit,
}

fn required(
    rest: &str,
    command: &'static str,
    argument: &'static str,
) -> Result<String, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument { command, argument })
    } else {
        Ok(rest.to_string())
    }
}

/// Setting values are JSON when they parse as JSON, strings otherwise.
fn setting_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let Some(command_line) = line.strip_prefix('/') else {
        return Ok(Command::Input(line.to_string()));
    };

    let (name, rest) = match command_line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command_line, ""),
    };

    let command = match name {
        "ask" => Command::Event(SessionEvent::Ask),
        "stop" => Command::Event(SessionEvent::Stop),
        "quit" => Command::Event(SessionEvent::Quit),
        "clear" => Command::Event(SessionEvent::Clear),
        "retry" => Command::Event(SessionEvent::Retry),
        "dismiss" => Command::Event(SessionEvent::Dismiss),
        "logout" => Command::Event(SessionEvent::Auth { user: None }),
        "sessions" => Command::Sessions,
        "help" => Command::Help,
        "exit" => Command::Exit,
        "drop" => Command::Event(SessionEvent::Drop {
            question: required(rest, "drop", "a question")?,
        }),
        "restore" => Command::Restore(required(rest, "restore", "a question")?),
        "login" => {
            let rest = required(rest, "login", "a user name")?;
            let mut parts = rest.split_whitespace();
            let username = parts.next().unwrap_or_default().to_string();
            let storage_key = parts.next().unwrap_or(&username).to_string();
            Command::Event(SessionEvent::Auth {
                user: Some(chat_core::UserRef::new(username, storage_key)),
            })
        }
        "regen" => {
            let rest = required(rest, "regen", "an answer number")?;
            let (index, text) = match rest.split_once(char::is_whitespace) {
                Some((index, text)) => (index, Some(text.trim().to_string())),
                None => (rest.as_str(), None),
            };
            let index = index
                .parse()
                .map_err(|_| CommandError::InvalidIndex(index.to_string()))?;
            Command::Regenerate { index, text }
        }
        "set" => {
            let rest = required(rest, "set", "a key and a value")?;
            let (key, value) = rest
                .split_once(char::is_whitespace)
                .ok_or(CommandError::MissingArgument {
                    command: "set",
                    argument: "a value",
                })?;
            let change = ContextChange::from_key_value(key, setting_value(value.trim()))?;
            Command::Event(SessionEvent::change(change))
        }
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::ResponseType;

    #[test]
    fn plain_text_is_input() {
        assert_eq!(
            parse_command("  what is rust? "),
            Ok(Command::Input("what is rust?".to_string()))
        );
    }

    #[test]
    fn simple_commands_map_to_events() {
        assert_eq!(parse_command("/ask"), Ok(Command::Event(SessionEvent::Ask)));
        assert_eq!(parse_command("/quit"), Ok(Command::Event(SessionEvent::Quit)));
        assert_eq!(parse_command("/exit"), Ok(Command::Exit));
    }

    #[test]
    fn set_parses_json_or_string_values() {
        assert_eq!(
            parse_command("/set silent true"),
            Ok(Command::Event(SessionEvent::change(ContextChange::Silent(
                true
            ))))
        );
        assert_eq!(
            parse_command("/set lang_code es-ES"),
            Ok(Command::Event(SessionEvent::change(ContextChange::LangCode(
                "es-ES".to_string()
            ))))
        );
        assert_eq!(
            parse_command("/set responseType image"),
            Ok(Command::Event(SessionEvent::change(
                ContextChange::ResponseType(ResponseType::Image)
            )))
        );
        assert_eq!(
            parse_command("/set max_tokens 3"),
            Err(CommandError::Change(ChangeError::MaxTokens(3)))
        );
    }

    #[test]
    fn regen_takes_index_and_optional_text() {
        assert_eq!(
            parse_command("/regen 2"),
            Ok(Command::Regenerate {
                index: 2,
                text: None
            })
        );
        assert_eq!(
            parse_command("/regen 0 shorter please"),
            Ok(Command::Regenerate {
                index: 0,
                text: Some("shorter please".to_string())
            })
        );
        assert_eq!(
            parse_command("/regen x"),
            Err(CommandError::InvalidIndex("x".to_string()))
        );
    }

    #[test]
    fn login_defaults_storage_key_to_name() {
        match parse_command("/login ada") {
            Ok(Command::Event(SessionEvent::Auth { user: Some(user) })) => {
                assert_eq!(user.username, "ada");
                assert_eq!(user.storage_key, "ada");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_arguments_and_unknown_commands() {
        assert!(matches!(
            parse_command("/drop"),
            Err(CommandError::MissingArgument { command: "drop", .. })
        ));
        assert_eq!(
            parse_command("/dance"),
            Err(CommandError::Unknown("dance".to_string()))
        );
    }
}
