//! Filter Extractor: free text + recent turns → structured `Filter`.
//!
//! Never fails: unusable model output falls back to the session's last filters
//! (as a "more" request) when a search is active, or to an empty filter.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agent::engine::SessionState;
use crate::agent::prompts::{EXTRACTION_PROMPT_TEMPLATE, EXTRACTION_SYSTEM};
use crate::agent::vocab::{self, MAX_PAGE_SIZE};
use crate::agent::AgentDeps;
use crate::chat::history::transcript;
use crate::directory;
use crate::llm_client::prompts::fill_template;
use crate::llm_client::{complete_json_within, CompletionRequest};
use crate::models::chat::ChatMessage;
use crate::models::record::SearchRecord;

/// History turns included in the extraction prompt.
const EXTRACTION_HISTORY_TURNS: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub role: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub category_name: Option<String>,
    /// Set whenever `category_name` resolves in the Category Directory.
    pub category_id: Option<String>,
    pub max_results: Option<u32>,
    pub is_request_for_more: bool,
    pub has_at_least_one_filter: bool,
}

impl Filter {
    pub fn has_criteria(&self) -> bool {
        self.role.is_some()
            || self.location.is_some()
            || self.employment_type.is_some()
            || self.category_name.is_some()
    }

    /// The stored query replayed for pagination.
    pub fn as_request_for_more(&self) -> Filter {
        Filter {
            is_request_for_more: true,
            ..self.clone()
        }
    }
}

/// What the model must return. `is_request_for_more` is required; a missing one is a
/// parse failure. Whether any criteria are present is derived locally.
#[derive(Debug, Deserialize)]
struct ExtractionOutput {
    role: Option<String>,
    location: Option<String>,
    employment_type: Option<String>,
    category_name: Option<String>,
    max_results: Option<u32>,
    is_request_for_more: bool,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !matches!(v.to_lowercase().as_str(), "" | "null" | "none" | "any" | "n/a"))
}

/// Fallback used whenever extraction output cannot be used.
fn fallback<R: SearchRecord>(state: &SessionState<R>) -> Filter {
    match state.last_filters() {
        Some(last) if state.has_active_search() => last.as_request_for_more(),
        _ => Filter::default(),
    }
}

pub async fn extract_filters<R: SearchRecord>(
    deps: &AgentDeps,
    message: &str,
    history: &[ChatMessage],
    state: &SessionState<R>,
    token: &str,
) -> Filter {
    // Auth problems resurface at fetch time; here an empty directory is enough.
    let categories = match deps.directory.ensure_loaded(deps.source.as_ref(), token).await {
        Ok(categories) => categories,
        Err(e) => {
            warn!("Category directory unavailable during extraction: {e}");
            Default::default()
        }
    };
    let category_names = categories
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let history = transcript(history, EXTRACTION_HISTORY_TURNS);
    let prompt = fill_template(
        EXTRACTION_PROMPT_TEMPLATE,
        &[
            ("records", R::KIND.plural()),
            ("categories", &category_names),
            ("history", &history),
            ("message", message),
        ],
    );
    let request = CompletionRequest::new(EXTRACTION_SYSTEM, &prompt)
        .temperature(0.0)
        .max_tokens(300);

    let output: ExtractionOutput =
        match complete_json_within(deps.llm.as_ref(), request, deps.timeouts.extraction).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Filter extraction failed, using fallback: {e}");
                return fallback(state);
            }
        };

    if output.is_request_for_more {
        if let Some(last) = state.last_filters() {
            debug!("Extraction flagged a request for more; replaying stored filters");
            return last.as_request_for_more();
        }
    }

    let mut filter = Filter {
        role: clean(output.role),
        location: clean(output.location),
        employment_type: clean(output.employment_type),
        category_name: clean(output.category_name),
        category_id: None,
        max_results: output.max_results,
        is_request_for_more: output.is_request_for_more,
        has_at_least_one_filter: false,
    };

    if let Some(name) = filter.category_name.as_deref() {
        filter.category_id = directory::resolve(&categories, name).map(|c| c.id.clone());
    }
    apply_count_overrides(&mut filter, message, deps.vocabulary);
    filter.has_at_least_one_filter = filter.has_criteria();

    debug!("Extracted filter: {filter:?}");
    filter
}

/// A literal "<N> jobs" in the message beats the model; "show all" forces the cap.
fn apply_count_overrides(filter: &mut Filter, message: &str, vocabulary: &vocab::Vocabulary) {
    if vocab::asks_for_all(message) {
        filter.max_results = Some(MAX_PAGE_SIZE);
    } else if let Some(n) = vocabulary.requested_count(message) {
        filter.max_results = Some(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::deps_with;
    use crate::llm_client::testing::{ScriptedModel, StalledModel};
    use crate::models::record::Job;
    use crate::source::testing::FakeSource;
    use std::sync::Arc;

    fn source() -> FakeSource {
        FakeSource::default()
            .with_category("10", "Transport & Logistics", vec![])
            .with_category("20", "Healthcare", vec![])
    }

    fn searched_state() -> SessionState<Job> {
        let mut state = SessionState::default();
        let stored = Filter {
            role: Some("driver".to_string()),
            location: Some("Kigali".to_string()),
            max_results: Some(6),
            has_at_least_one_filter: true,
            ..Filter::default()
        };
        state.install_results(vec![Job::default(); 9], 6, stored);
        state
    }

    #[tokio::test]
    async fn test_extracts_and_resolves_category() {
        let model = ScriptedModel::new().reply(
            r#"{"role":"nurse","location":"Huye","employment_type":null,
                "category_name":"healthcare","max_results":4,
                "is_request_for_more":false}"#,
        );
        let deps = deps_with(Arc::new(model), Arc::new(source()));

        let filter = extract_filters(&deps, "nurses in Huye", &[], &SessionState::<Job>::default(), "t").await;

        assert_eq!(filter.role.as_deref(), Some("nurse"));
        assert_eq!(filter.category_id.as_deref(), Some("20"));
        assert_eq!(filter.max_results, Some(4));
        assert!(filter.has_at_least_one_filter);
        assert!(!filter.is_request_for_more);
    }

    #[tokio::test]
    async fn test_unknown_category_leaves_id_empty() {
        let model = ScriptedModel::new().reply(
            r#"{"category_name":"Space Travel","is_request_for_more":false}"#,
        );
        let deps = deps_with(Arc::new(model), Arc::new(source()));

        let filter = extract_filters(&deps, "space jobs", &[], &SessionState::<Job>::default(), "t").await;

        assert_eq!(filter.category_name.as_deref(), Some("Space Travel"));
        assert!(filter.category_id.is_none());
    }

    #[tokio::test]
    async fn test_literal_count_overrides_model() {
        let model = ScriptedModel::new().reply(
            r#"{"role":"driver","max_results":10,"is_request_for_more":false}"#,
        );
        let deps = deps_with(Arc::new(model), Arc::new(source()));

        let filter = extract_filters(&deps, "show me 3 jobs for drivers", &[], &SessionState::<Job>::default(), "t").await;

        assert_eq!(filter.max_results, Some(3));
    }

    #[tokio::test]
    async fn test_request_for_more_replays_stored_filters_verbatim() {
        let model = ScriptedModel::new().reply(
            r#"{"role":"chef","location":"Rubavu","is_request_for_more":true}"#,
        );
        let deps = deps_with(Arc::new(model), Arc::new(source()));
        let state = searched_state();

        let filter = extract_filters(&deps, "any others? maybe chefs", &[], &state, "t").await;

        assert!(filter.is_request_for_more);
        assert_eq!(filter.role.as_deref(), Some("driver"));
        assert_eq!(filter.location.as_deref(), Some("Kigali"));
    }

    #[tokio::test]
    async fn test_malformed_output_with_active_search_falls_back_to_more() {
        let model = ScriptedModel::new().reply("Sure! Here are the filters you asked for.");
        let deps = deps_with(Arc::new(model), Arc::new(source()));

        let filter = extract_filters(&deps, "more", &[], &searched_state(), "t").await;

        assert!(filter.is_request_for_more);
        assert_eq!(filter.location.as_deref(), Some("Kigali"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_search_yields_empty_filter() {
        let deps = deps_with(Arc::new(StalledModel), Arc::new(source()));

        let filter = extract_filters(&deps, "drivers", &[], &SessionState::<Job>::default(), "t").await;

        assert_eq!(filter, Filter::default());
    }

    #[test]
    fn test_clean_drops_placeholder_values() {
        assert_eq!(clean(Some(" Any ".to_string())), None);
        assert_eq!(clean(Some("null".to_string())), None);
        assert_eq!(clean(Some(" Kigali ".to_string())), Some("Kigali".to_string()));
    }
}
