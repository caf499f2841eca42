//! Cleanup of reasoning blocks in model output.
//!
//! Some local models emit their chain of thought wrapped in tags like
//! `<think>…</think>` before the actual answer. Responses routed through
//! runtimes that do not strip these themselves get cleaned here.

use std::sync::LazyLock;

use regex::Regex;

static TAG_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?s)<think>.*?</think>",
        r"(?s)<thinking>.*?</thinking>",
        r"(?s)<thought>.*?</thought>",
        r"(?s)<reasoning>.*?</reasoning>",
        r"(?s)\[thinking\].*?\[/thinking\]",
        r"(?s)\[thought\].*?\[/thought\]",
        r"(?s)<!-- thinking:.*?-->",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static pattern"))
    .collect()
});

static EXTRA_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static pattern"));

/// Remove reasoning blocks and collapse the whitespace they leave behind.
pub fn clean_model_response(response: &str) -> String {
    let mut cleaned = response.to_string();
    for pattern in TAG_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = EXTRA_NEWLINES.replace_all(&cleaned, "\n\n");
    cleaned.trim().to_string()
}
