//! Response Composer: turns counts and filter labels into the chat reply.
//!
//! The model only ever sees a numeric brief, never the records themselves.
//! Any failure falls back to a fixed template, so a reply always exists.

use serde::Serialize;
use tracing::warn;

use crate::agent::filters::Filter;
use crate::agent::prompts::{COMPOSE_PROMPT_TEMPLATE, COMPOSE_SYSTEM};
use crate::agent::AgentDeps;
use crate::llm_client::prompts::{fill_template, NO_INVENTION_INSTRUCTION, PLATFORM_PERSONA};
use crate::llm_client::{complete_within, CompletionRequest};
use crate::models::record::RecordKind;

const MAX_REPLY_CHARS: usize = 1_000;

/// Outcome of one search turn, as the composer sees it.
#[derive(Debug, Clone, Copy)]
pub struct SearchSummary<'a> {
    pub kind: RecordKind,
    pub filter: &'a Filter,
    pub total_found: usize,
    pub showing: usize,
    pub is_load_more: bool,
    pub has_more: bool,
}

#[derive(Serialize)]
struct Brief<'a> {
    looking_for: &'static str,
    total_found: usize,
    showing_now: usize,
    is_load_more: bool,
    more_available: bool,
    role: Option<&'a str>,
    location: Option<&'a str>,
    employment_type: Option<&'a str>,
    category: Option<&'a str>,
}

pub async fn compose(deps: &AgentDeps, summary: SearchSummary<'_>) -> String {
    let brief = Brief {
        looking_for: summary.kind.plural(),
        total_found: summary.total_found,
        showing_now: summary.showing,
        is_load_more: summary.is_load_more,
        more_available: summary.has_more,
        role: summary.filter.role.as_deref(),
        location: summary.filter.location.as_deref(),
        employment_type: summary.filter.employment_type.as_deref(),
        category: summary.filter.category_name.as_deref(),
    };
    let brief = match serde_json::to_string_pretty(&brief) {
        Ok(brief) => brief,
        Err(e) => {
            warn!("Could not serialize compose brief: {e}");
            return fallback_message(summary);
        }
    };

    let prompt = fill_template(
        COMPOSE_PROMPT_TEMPLATE,
        &[
            ("persona", PLATFORM_PERSONA),
            ("no_invention", NO_INVENTION_INSTRUCTION),
            ("brief", &brief),
        ],
    );
    let request = CompletionRequest::new(COMPOSE_SYSTEM, &prompt)
        .temperature(0.7)
        .max_tokens(200);

    match complete_within(deps.llm.as_ref(), request, deps.timeouts.compose).await {
        Ok(text) => {
            let text = text.trim().trim_matches('"').trim();
            if text.is_empty() || text.chars().count() > MAX_REPLY_CHARS {
                warn!("Composed reply unusable ({} chars); using template", text.len());
                fallback_message(summary)
            } else {
                text.to_string()
            }
        }
        Err(e) => {
            warn!("Reply composition failed, using template: {e}");
            fallback_message(summary)
        }
    }
}

/// Deterministic reply keyed by `(result count: 0 | 1 | many, is_load_more)`.
/// For a fresh search the count is the total found; for "more" it is the page size.
pub fn fallback_message(summary: SearchSummary<'_>) -> String {
    let kind = summary.kind;
    let count = if summary.is_load_more {
        summary.showing
    } else {
        summary.total_found
    };
    let more_hint = if summary.has_more {
        " Say \"show more\" to see the rest."
    } else {
        ""
    };

    match (count, summary.is_load_more) {
        (0, false) => format!(
            "I couldn't find any {} matching your search right now. \
            Try broadening it, for example with a nearby location or a related role.",
            kind.plural()
        ),
        (0, true) => format!(
            "That's everything. There are no more {} matching your search.",
            kind.plural()
        ),
        (1, false) => format!("I found 1 {} matching your search.", kind.singular()),
        (1, true) => format!("Here is 1 more {}.{more_hint}", kind.singular()),
        (_, false) => format!(
            "I found {} matching your search. Here are the first {}.{more_hint}",
            kind.count_label(count),
            summary.showing
        ),
        (_, true) => format!("Here are {count} more {}.{more_hint}", kind.plural()),
    }
}
