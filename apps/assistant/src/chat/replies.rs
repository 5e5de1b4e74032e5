//! Replies for turns that do not run a search, plus session titles.
//!
//! Each path has a fixed fallback so a model outage never leaves a turn silent.

use std::time::Duration;

use tracing::warn;

use crate::chat::history::transcript;
use crate::chat::prompts::{
    CLARIFY_PROMPT_TEMPLATE, CLARIFY_SYSTEM, GENERIC_CHAT_PROMPT_TEMPLATE, GENERIC_CHAT_SYSTEM,
    TITLE_PROMPT_TEMPLATE, TITLE_SYSTEM,
};
use crate::llm_client::prompts::{fill_template, NO_INVENTION_INSTRUCTION, PLATFORM_PERSONA};
use crate::llm_client::{complete_within, CompletionRequest, TextModel};
use crate::models::chat::ChatMessage;
use crate::models::record::RecordKind;

const GENERIC_HISTORY_TURNS: usize = 6;
const TITLE_MAX_WORDS: usize = 6;
const TITLE_MAX_CHARS: usize = 60;

pub const GENERIC_FALLBACK: &str = "Sorry, I can't answer that right now. \
    You can ask me to find jobs or candidates by role, location or employment type.";

pub fn clarification_fallback(kind: RecordKind) -> String {
    format!(
        "Happy to help you find {}. Which role or skill are you after, \
        and in which location? You can also mention full-time, part-time or contract.",
        kind.plural()
    )
}

/// Model text if usable, else `None`.
async fn usable_reply(
    llm: &dyn TextModel,
    request: CompletionRequest<'_>,
    deadline: Duration,
    what: &str,
) -> Option<String> {
    match complete_within(llm, request, deadline).await {
        Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Ok(_) => {
            warn!("Empty {what} reply from model");
            None
        }
        Err(e) => {
            warn!("{what} reply failed: {e}");
            None
        }
    }
}

pub async fn generic_reply(
    llm: &dyn TextModel,
    deadline: Duration,
    message: &str,
    history: &[ChatMessage],
) -> String {
    let history = transcript(history, GENERIC_HISTORY_TURNS);
    let prompt = fill_template(
        GENERIC_CHAT_PROMPT_TEMPLATE,
        &[
            ("persona", PLATFORM_PERSONA),
            ("no_invention", NO_INVENTION_INSTRUCTION),
            ("history", &history),
            ("message", message),
        ],
    );
    let request = CompletionRequest::new(GENERIC_CHAT_SYSTEM, &prompt)
        .temperature(0.7)
        .max_tokens(300);

    usable_reply(llm, request, deadline, "Generic chat")
        .await
        .unwrap_or_else(|| GENERIC_FALLBACK.to_string())
}

pub async fn clarification_reply(
    llm: &dyn TextModel,
    deadline: Duration,
    kind: RecordKind,
    message: &str,
) -> String {
    let prompt = fill_template(
        CLARIFY_PROMPT_TEMPLATE,
        &[
            ("persona", PLATFORM_PERSONA),
            ("records", kind.plural()),
            ("message", message),
        ],
    );
    let request = CompletionRequest::new(CLARIFY_SYSTEM, &prompt)
        .temperature(0.5)
        .max_tokens(120);

    usable_reply(llm, request, deadline, "Clarification")
        .await
        .unwrap_or_else(|| clarification_fallback(kind))
}

pub async fn session_title(llm: &dyn TextModel, deadline: Duration, message: &str) -> String {
    let prompt = fill_template(TITLE_PROMPT_TEMPLATE, &[("message", message)]);
    let request = CompletionRequest::new(TITLE_SYSTEM, &prompt)
        .temperature(0.3)
        .max_tokens(20);

    usable_reply(llm, request, deadline, "Title")
        .await
        .map(|title| title.trim_matches(|c: char| c == '"' || c == '.').trim().to_string())
        .filter(|title| !title.is_empty() && title.chars().count() <= TITLE_MAX_CHARS)
        .unwrap_or_else(|| title_fallback(message))
}

/// First few words of the message, capped in length.
pub fn title_fallback(message: &str) -> String {
    let words: Vec<&str> = message.split_whitespace().take(TITLE_MAX_WORDS).collect();
    if words.is_empty() {
        return "New conversation".to_string();
    }
    let title = words.join(" ");
    if title.chars().count() <= TITLE_MAX_CHARS {
        title
    } else {
        title.chars().take(TITLE_MAX_CHARS).collect()
    }
}
