pub mod composer;
pub mod engine;
pub mod filters;
pub mod intent;
pub mod matching;
pub mod prompts;
pub mod ranking;
pub mod vocab;

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::agent::composer::{compose, SearchSummary};
use crate::agent::engine::{perform_search, SessionState};
use crate::agent::filters::{extract_filters, Filter};
use crate::agent::intent::IntentDecision;
use crate::agent::vocab::Vocabulary;
use crate::config::AgentTimeouts;
use crate::directory::CategoryDirectory;
use crate::llm_client::TextModel;
use crate::models::chat::ChatMessage;
use crate::models::record::SearchRecord;
use crate::session::SessionRegistry;
use crate::source::RecordSource;

/// The only failures a search turn surfaces; everything else degrades locally.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid turn: {0}")]
    Validation(String),
}

/// Collaborators shared by every session of one agent variant.
#[derive(Clone)]
pub struct AgentDeps {
    pub llm: Arc<dyn TextModel>,
    pub source: Arc<dyn RecordSource>,
    pub directory: Arc<CategoryDirectory>,
    pub vocabulary: &'static Vocabulary,
    pub timeouts: AgentTimeouts,
}

/// Result of the search half of a handled turn, before any text is composed.
#[derive(Debug, Clone)]
pub struct SearchOutcome<R> {
    pub records: Vec<R>,
    pub total: usize,
    pub has_more: bool,
    pub filter: Filter,
    pub is_load_more: bool,
}

impl<R: SearchRecord> SearchOutcome<R> {
    /// Narrative reply for this outcome. Never fails; see `composer::compose`.
    pub async fn compose(&self, deps: &AgentDeps) -> String {
        compose(
            deps,
            SearchSummary {
                kind: R::KIND,
                filter: &self.filter,
                total_found: self.total,
                showing: self.records.len(),
                is_load_more: self.is_load_more,
                has_more: self.has_more,
            },
        )
        .await
    }
}

/// One conversation's search agent. Owns its `SessionState` exclusively.
#[derive(Debug)]
pub struct SearchAgent<R> {
    state: SessionState<R>,
}

impl<R: SearchRecord> Default for SearchAgent<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SearchRecord> SearchAgent<R> {
    pub fn new() -> Self {
        Self {
            state: SessionState::default(),
        }
    }

    pub fn state(&self) -> &SessionState<R> {
        &self.state
    }

    /// Intent Gate for this session; updates the conversation context.
    pub async fn gate(
        &mut self,
        deps: &AgentDeps,
        message: &str,
        history: &[ChatMessage],
    ) -> IntentDecision {
        intent::evaluate(deps, message, history, &mut self.state).await
    }

    /// Extract filters, then search or page. `history` is most-recent-first.
    /// Composition is left to the caller so results can be shown first.
    pub async fn search(
        &mut self,
        deps: &AgentDeps,
        message: &str,
        history: &[ChatMessage],
        token: &str,
    ) -> Result<SearchOutcome<R>, AgentError> {
        if message.trim().is_empty() {
            return Err(AgentError::Validation("message is required".to_string()));
        }
        if token.trim().is_empty() {
            return Err(AgentError::Auth("Authentication token is required".to_string()));
        }

        let mut filter = extract_filters(deps, message, history, &self.state, token).await;
        let is_load_more = filter.is_request_for_more
            && self.state.last_filters().is_some()
            && self.state.total_matched_count() > 0;
        let all_remaining = is_load_more && vocab::asks_for_all(message);
        if is_load_more {
            // "show me 3 more" pages by the new count without touching the stored query.
            if let Some(n) = deps.vocabulary.requested_count(message) {
                filter.max_results = Some(n);
            }
        }

        let records = perform_search(
            deps,
            &mut self.state,
            &filter,
            is_load_more,
            all_remaining,
            token,
            Utc::now(),
        )
        .await?;

        if is_load_more && records.is_empty() {
            debug!("Stored {} exhausted; closing the active search", R::KIND.plural());
            self.state.clear_active_search();
        }

        let total = self.state.total_matched_count();
        let has_more = self.state.has_more();
        debug!(
            "{} turn: load_more={is_load_more}, offset {}/{total}, searches this session {}",
            R::KIND.plural(),
            self.state.current_offset(),
            self.state.context.searches_run
        );
        Ok(SearchOutcome {
            records,
            total,
            has_more,
            filter,
            is_load_more,
        })
    }
}

/// One agent variant: its shared collaborators plus the per-session agents.
pub struct SearchService<R> {
    deps: AgentDeps,
    sessions: Arc<SessionRegistry<SearchAgent<R>>>,
}

impl<R> Clone for SearchService<R> {
    fn clone(&self) -> Self {
        Self {
            deps: self.deps.clone(),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<R: SearchRecord> SearchService<R> {
    pub fn new(deps: AgentDeps, sessions: Arc<SessionRegistry<SearchAgent<R>>>) -> Self {
        Self { deps, sessions }
    }

    pub fn deps(&self) -> &AgentDeps {
        &self.deps
    }

    /// The agent owning `session_id`, created on first use. Callers hold its
    /// lock for the whole turn, which serializes turns within a session.
    pub async fn agent(&self, session_id: Uuid) -> Arc<Mutex<SearchAgent<R>>> {
        self.sessions.get_or_create(session_id, SearchAgent::new).await
    }

    pub async fn evict(&self, session_id: Uuid) -> bool {
        let evicted = self.sessions.evict(session_id).await;
        if evicted {
            info!("Evicted {} agent for session {session_id}", R::KIND.plural());
        }
        evicted
    }

    pub async fn evict_idle(&self, ttl: std::time::Duration) -> usize {
        self.sessions.evict_idle(ttl).await
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.len().await
    }
}

#[cfg(test)]
pub mod testing {
    //! Agent wiring over in-test fakes.

    use std::sync::Arc;

    use super::AgentDeps;
    use crate::agent::vocab::{Vocabulary, CANDIDATE_VOCABULARY, JOB_VOCABULARY};
    use crate::config::AgentTimeouts;
    use crate::directory::CategoryDirectory;
    use crate::llm_client::TextModel;
    use crate::source::RecordSource;

    fn deps_for(
        vocabulary: &'static Vocabulary,
        llm: Arc<dyn TextModel>,
        source: Arc<dyn RecordSource>,
    ) -> AgentDeps {
        AgentDeps {
            llm,
            source,
            directory: Arc::new(CategoryDirectory::new()),
            vocabulary,
            timeouts: AgentTimeouts::default(),
        }
    }

    /// Job-search wiring.
    pub fn deps_with(llm: Arc<dyn TextModel>, source: Arc<dyn RecordSource>) -> AgentDeps {
        deps_for(&JOB_VOCABULARY, llm, source)
    }

    /// Candidate-search wiring.
    pub fn candidate_deps_with(
        llm: Arc<dyn TextModel>,
        source: Arc<dyn RecordSource>,
    ) -> AgentDeps {
        deps_for(&CANDIDATE_VOCABULARY, llm, source)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{candidate_deps_with, deps_with};
    use super::*;
    use crate::llm_client::testing::{ScriptedModel, StalledModel};
    use crate::models::record::{Candidate, Job};
    use crate::source::testing::FakeSource;
    use serde_json::{json, Value};

    fn drivers(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"id": i, "title": "Truck Driver", "district": "Kigali", "employmentType": "Full-time"}))
            .collect()
    }

    async fn turn<R: SearchRecord>(
        agent: &mut SearchAgent<R>,
        deps: &AgentDeps,
        message: &str,
    ) -> (SearchOutcome<R>, String) {
        let outcome = agent.search(deps, message, &[], "token").await.unwrap();
        let text = outcome.compose(deps).await;
        (outcome, text)
    }

    const DRIVER_FILTER: &str = r#"{"role":"driver","location":"Kigali","employment_type":null,
        "category_name":null,"max_results":6,"is_request_for_more":false}"#;
    const MORE_FILTER: &str = r#"{"role":null,"location":null,"employment_type":null,
        "category_name":null,"max_results":null,"is_request_for_more":true}"#;

    #[tokio::test]
    async fn test_search_then_show_more() {
        let model = ScriptedModel::new()
            .reply(DRIVER_FILTER)
            .reply("I found 9 drivers in Kigali; here are the first 6.")
            .reply(MORE_FILTER)
            .reply("Here are the last 3 drivers.");
        let source = FakeSource::default().with_category("1", "Transport", drivers(9));
        let deps = deps_with(Arc::new(model), Arc::new(source));
        let mut agent = SearchAgent::<Job>::new();

        let (first, _) = turn(&mut agent, &deps, "Show me driver jobs in Kigali").await;
        assert_eq!(first.records.len(), 6);
        assert_eq!(first.total, 9);
        assert!(first.has_more);

        let (second, text) = turn(&mut agent, &deps, "show more").await;
        assert_eq!(second.records.len(), 3);
        assert!(second.is_load_more);
        assert!(!second.has_more);
        assert_eq!(second.filter.location.as_deref(), Some("Kigali"));
        assert_eq!(text, "Here are the last 3 drivers.");
    }

    #[tokio::test]
    async fn test_exhausted_more_closes_active_search() {
        let model = ScriptedModel::new()
            .reply(DRIVER_FILTER)
            .reply("six")
            .reply(MORE_FILTER)
            .reply("three")
            .reply(MORE_FILTER);
        let source = FakeSource::default().with_category("1", "Transport", drivers(9));
        let deps = deps_with(Arc::new(model), Arc::new(source));
        let mut agent = SearchAgent::<Job>::new();

        for message in ["driver jobs in Kigali", "more"] {
            turn(&mut agent, &deps, message).await;
        }
        let (last, text) = turn(&mut agent, &deps, "more").await;

        assert!(last.records.is_empty());
        assert!(text.starts_with("That's everything"));
        assert!(!agent.state().has_active_search());
    }

    #[tokio::test]
    async fn test_unknown_category_with_no_survivors_uses_zero_template() {
        let model = ScriptedModel::new().reply(
            r#"{"role":"astronaut","category_name":"Space","max_results":null,
                "is_request_for_more":false}"#,
        );
        let source = Arc::new(
            FakeSource::default()
                .with_category("1", "Transport", drivers(3))
                .with_category("2", "Healthcare", vec![]),
        );
        // Nothing left in the script, so composition fails and the template is used.
        let deps = candidate_deps_with(Arc::new(model), source.clone());
        let mut agent = SearchAgent::<Candidate>::new();

        let (outcome, text) = turn(&mut agent, &deps, "find astronauts in the Space category").await;

        assert!(outcome.records.is_empty());
        assert_eq!(source.record_fetches(), 2);
        assert!(text.starts_with("I couldn't find any candidates"));
        assert!(!agent.state().has_active_search());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_model_calls_stalled_still_replies() {
        let source = FakeSource::default().with_category("1", "Transport", drivers(2));
        let deps = deps_with(Arc::new(StalledModel), Arc::new(source));
        let mut agent = SearchAgent::<Job>::new();

        let (outcome, text) = turn(&mut agent, &deps, "jobs please").await;

        // Empty filter scans everything; the template reports what was found.
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(text, "I found 2 jobs matching your search. Here are the first 2.");
    }

    #[tokio::test]
    async fn test_missing_inputs_are_rejected() {
        let deps = deps_with(Arc::new(ScriptedModel::new()), Arc::new(FakeSource::default()));
        let mut agent = SearchAgent::<Job>::new();

        let err = agent.search(&deps, "  ", &[], "token").await.unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));

        let err = agent.search(&deps, "jobs", &[], "").await.unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
    }

    #[tokio::test]
    async fn test_service_reuses_agent_per_session() {
        let deps = deps_with(Arc::new(ScriptedModel::new()), Arc::new(FakeSource::default()));
        let service = SearchService::<Job>::new(deps, Arc::new(SessionRegistry::new()));
        let session = Uuid::new_v4();

        let a = service.agent(session).await;
        let b = service.agent(session).await;
        assert!(Arc::ptr_eq(&a, &b));

        assert!(service.evict(session).await);
        let c = service.agent(session).await;
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
