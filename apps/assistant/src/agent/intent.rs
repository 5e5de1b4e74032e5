//! Intent Gate: decides per message whether a search agent should answer.
//!
//! Order: disqualifying phrases, qualifying phrases, then a bounded model
//! classification. Classification failures fail closed, apart from a narrow
//! keyword safety net.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::agent::engine::SessionState;
use crate::agent::prompts::{INTENT_PROMPT_TEMPLATE, INTENT_SYSTEM};
use crate::agent::vocab::Vocabulary;
use crate::agent::AgentDeps;
use crate::chat::history::transcript;
use crate::llm_client::prompts::fill_template;
use crate::llm_client::{complete_json_within, CompletionRequest};
use crate::models::chat::ChatMessage;
use crate::models::record::{RecordKind, SearchRecord};

const INTENT_HISTORY_TURNS: usize = 4;
/// Paging follow-ups longer than this go through the classifier.
const SHORT_FOLLOW_UP_WORDS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentDecision {
    /// Run a search for this message.
    Handle,
    /// Search intent without concrete criteria; ask the user to narrow it down.
    Clarify,
    /// Not for this agent; hand over to generic chat.
    Decline,
}

/// Strict classifier verdict; any missing field is a parse failure.
#[derive(Debug, Deserialize)]
struct Classification {
    should_handle: bool,
    has_specific_criteria: bool,
    is_follow_up: bool,
}

fn role_hint(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Candidates => "employers and admins looking for people to hire",
        RecordKind::Jobs => "job seekers looking for openings to apply to",
    }
}

fn is_short_follow_up(vocabulary: &Vocabulary, message: &str) -> bool {
    message.split_whitespace().count() <= SHORT_FOLLOW_UP_WORDS
        && vocabulary.asks_for_next_page(message)
}

pub async fn evaluate<R: SearchRecord>(
    deps: &AgentDeps,
    message: &str,
    history: &[ChatMessage],
    state: &mut SessionState<R>,
) -> IntentDecision {
    let vocabulary = deps.vocabulary;

    if vocabulary.is_disqualified(message) {
        debug!("Intent: disqualifying phrase for {}", vocabulary.kind.plural());
        state.clear_active_search();
        state.context.last_intent = false;
        return IntentDecision::Decline;
    }

    if vocabulary.is_qualified(message) {
        debug!("Intent: qualifying phrase for {}", vocabulary.kind.plural());
        state.context.last_intent = true;
        return IntentDecision::Handle;
    }

    let continuing = state.has_active_search() && state.context.last_intent;
    if continuing && is_short_follow_up(vocabulary, message) {
        debug!("Intent: short follow-up to an active search");
        return IntentDecision::Handle;
    }

    let active = state.has_active_search().to_string();
    let last_intent = state.context.last_intent.to_string();
    let history = transcript(history, INTENT_HISTORY_TURNS);
    let prompt = fill_template(
        INTENT_PROMPT_TEMPLATE,
        &[
            ("records", R::KIND.plural()),
            ("role_hint", role_hint(R::KIND)),
            ("active", &active),
            ("last_intent", &last_intent),
            ("history", &history),
            ("message", message),
        ],
    );
    let system = fill_template(INTENT_SYSTEM, &[("records", R::KIND.plural())]);
    let request = CompletionRequest::new(&system, &prompt)
        .temperature(0.0)
        .max_tokens(100);

    let verdict: Classification =
        match complete_json_within(deps.llm.as_ref(), request, deps.timeouts.intent).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Intent classification failed: {e}");
                let rescued = vocabulary.passes_safety_net(message);
                state.context.last_intent = rescued;
                return if rescued {
                    IntentDecision::Handle
                } else {
                    IntentDecision::Decline
                };
            }
        };
    debug!("Intent verdict: {verdict:?}");

    let decision = if verdict.is_follow_up {
        if continuing {
            IntentDecision::Handle
        } else {
            IntentDecision::Decline
        }
    } else if verdict.should_handle && verdict.has_specific_criteria {
        IntentDecision::Handle
    } else if verdict.should_handle {
        IntentDecision::Clarify
    } else {
        IntentDecision::Decline
    };

    state.context.last_intent = decision == IntentDecision::Handle;
    decision
}
