use chat_core::{language_label, Archive, ResponseType, Turn};
use chat_state::{SessionContext, SessionState};
use colored::Colorize;

pub fn render_turn(turn: &Turn) -> String {
    let mut out = format!("{} {}\n", "you:".bold(), turn.question);
    let answer = match turn.response_type {
        ResponseType::Text => turn.answer.clone(),
        ResponseType::Image => format!("{} {}", "image:".cyan(), turn.answer),
    };
    out.push_str(&format!("{} {}", "bot:".bold().green(), answer));
    if turn.is_incomplete() {
        out.push_str(&format!(
            "\n{}",
            "(answer cut short, /regen 0 to try again with a larger max_tokens)".yellow()
        ));
    }
    out.push_str(&format!(
        "\n{}",
        format!("[{:.1}s]", turn.response_time_ms as f64 / 1000.0).dimmed()
    ));
    out
}

pub fn render_status(state: &SessionState, context: &SessionContext) -> String {
    match state {
        SessionState::Failed(failure) => format!(
            "{} {} failed: {} (/retry or /dismiss)",
            "!".red().bold(),
            failure.service,
            failure.error
        ),
        _ => {
            let lang = language_label(&context.lang_code).unwrap_or(context.lang_code.as_str());
            format!(
                "{}",
                format!("[{}] {} ({})", state, state.description(), lang).dimmed()
            )
        }
    }
}

pub fn render_sessions(sessions: &Archive) -> String {
    if sessions.is_empty() {
        return "No archived conversations".to_string();
    }
    sessions
        .iter()
        .map(|(question, turns)| format!("  {} ({} turns)", question, turns.len()))
        .collect::<Vec<_>>()
        .join("\n")
}
