use std::sync::OnceLock;

use regex::Regex;

fn fenced_code() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| Regex::new(r"(?s)```.*?```").expect("valid fenced code regex"))
}

/// Strip fenced code blocks and stray backticks so code is not read aloud.
pub fn speakable_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    fenced_code().replace_all(text, "").replace('`', "")
}
