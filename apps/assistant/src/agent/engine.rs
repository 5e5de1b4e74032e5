//! Search-Rank-Paginate Engine and the per-session search state it owns.
//!
//! A fresh search fetches, filters and ranks the full result set once and keeps
//! it; "more" turns only slice that stored set, never the remote source.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::filters::Filter;
use crate::agent::matching::apply_filters;
use crate::agent::ranking::rank;
use crate::agent::vocab::MAX_PAGE_SIZE;
use crate::agent::{AgentDeps, AgentError};
use crate::models::record::SearchRecord;
use crate::source::{RecordQuery, SourceError};

/// Page size when the user names no count.
pub const DEFAULT_PAGE_SIZE: u32 = 5;
/// Stop scanning further categories once this many records are accumulated.
pub const MAX_SCAN_RECORDS: usize = 500;

/// Conversation flags threaded between turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    /// Whether the previous turn was judged to be a search for this agent.
    pub last_intent: bool,
    pub searches_run: u32,
}

/// Invariant: `current_offset <= all_matched.len()`, and `has_active_search`
/// implies `all_matched` is non-empty.
#[derive(Debug, Clone)]
pub struct SessionState<R> {
    all_matched: Vec<R>,
    current_offset: usize,
    has_active_search: bool,
    last_filters: Option<Filter>,
    pub context: ConversationContext,
}

impl<R> Default for SessionState<R> {
    fn default() -> Self {
        Self {
            all_matched: Vec::new(),
            current_offset: 0,
            has_active_search: false,
            last_filters: None,
            context: ConversationContext::default(),
        }
    }
}

impl<R: SearchRecord> SessionState<R> {
    pub fn total_matched_count(&self) -> usize {
        self.all_matched.len()
    }

    pub fn current_offset(&self) -> usize {
        self.current_offset
    }

    pub fn has_active_search(&self) -> bool {
        self.has_active_search
    }

    pub fn has_more(&self) -> bool {
        self.current_offset < self.all_matched.len()
    }

    pub fn last_filters(&self) -> Option<&Filter> {
        self.last_filters.as_ref()
    }

    pub fn clear_active_search(&mut self) {
        self.has_active_search = false;
    }

    /// Replaces the stored result set wholesale and returns its first page.
    pub(crate) fn install_results(
        &mut self,
        ranked: Vec<R>,
        page_size: usize,
        filter: Filter,
    ) -> Vec<R> {
        self.all_matched = ranked;
        self.current_offset = page_size.min(self.all_matched.len());
        self.has_active_search = !self.all_matched.is_empty();
        self.last_filters = Some(Filter {
            is_request_for_more: false,
            ..filter
        });
        self.context.searches_run += 1;
        self.all_matched[..self.current_offset].to_vec()
    }

    /// Next slice of the stored set; `all_remaining` takes everything left.
    pub(crate) fn next_page(&mut self, page_size: usize, all_remaining: bool) -> Vec<R> {
        let start = self.current_offset;
        let end = if all_remaining {
            self.all_matched.len()
        } else {
            start.saturating_add(page_size).min(self.all_matched.len())
        };
        self.current_offset = end;
        self.all_matched[start..end].to_vec()
    }
}

/// `clamp(filter.max_results ?? default, 1, MAX_PAGE_SIZE)`.
pub fn page_size(filter: &Filter) -> usize {
    filter
        .max_results
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE) as usize
}

/// Deadline filter, local predicates and ranking over one fetched batch.
pub fn select_and_rank<R: SearchRecord>(fetched: Vec<R>, filter: &Filter, now: DateTime<Utc>) -> Vec<R> {
    let mut kept = apply_filters(fetched, filter, now);
    rank(&mut kept);
    kept
}

/// Runs one search turn against `state`.
///
/// Fresh searches replace the stored set; load-more turns slice it. Only an
/// auth failure from the remote source escapes as an error.
pub async fn perform_search<R: SearchRecord>(
    deps: &AgentDeps,
    state: &mut SessionState<R>,
    filter: &Filter,
    is_load_more: bool,
    all_remaining: bool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Vec<R>, AgentError> {
    let size = page_size(filter);

    if is_load_more {
        let page = state.next_page(size, all_remaining);
        debug!(
            "Load more: returned {} ({}/{})",
            page.len(),
            state.current_offset(),
            state.total_matched_count()
        );
        return Ok(page);
    }

    let fetched = fetch::<R>(deps, filter, token).await?;
    let fetched_count = fetched.len();
    let ranked = select_and_rank(fetched, filter, now);
    info!(
        "{} search: {} fetched, {} matched, page size {}",
        R::KIND.plural(),
        fetched_count,
        ranked.len(),
        size
    );
    Ok(state.install_results(ranked, size, filter.clone()))
}

async fn fetch<R: SearchRecord>(
    deps: &AgentDeps,
    filter: &Filter,
    token: &str,
) -> Result<Vec<R>, AgentError> {
    let hints = RecordQuery {
        category_id: None,
        location: filter.location.clone(),
        employment_type: filter.employment_type.clone(),
    };

    if let Some(category_id) = filter.category_id.clone() {
        let query = RecordQuery {
            category_id: Some(category_id),
            ..hints
        };
        return fetch_one::<R>(deps, &query, token).await;
    }

    let categories = deps
        .directory
        .ensure_loaded(deps.source.as_ref(), token)
        .await
        .map_err(|e| AgentError::Auth(e.to_string()))?;

    if categories.is_empty() {
        // No directory to scan; fall back to a single unscoped fetch.
        return fetch_one::<R>(deps, &hints, token).await;
    }

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for category in categories.iter() {
        if records.len() >= MAX_SCAN_RECORDS {
            debug!("Scan cap of {MAX_SCAN_RECORDS} reached; skipping remaining categories");
            break;
        }
        let query = RecordQuery {
            category_id: Some(category.id.clone()),
            ..hints.clone()
        };
        for record in fetch_one::<R>(deps, &query, token).await? {
            if record.id().is_empty() || seen.insert(record.id().to_string()) {
                records.push(record);
            }
        }
    }
    records.truncate(MAX_SCAN_RECORDS);
    Ok(records)
}

/// One remote call. Non-auth failures degrade to zero records.
async fn fetch_one<R: SearchRecord>(
    deps: &AgentDeps,
    query: &RecordQuery,
    token: &str,
) -> Result<Vec<R>, AgentError> {
    match deps.source.fetch_records(R::KIND, query, token).await {
        Ok(raw) => Ok(decode(raw)),
        Err(SourceError::Unauthorized(msg)) => Err(AgentError::Auth(msg)),
        Err(e) => {
            warn!(
                "Fetching {} for category {:?} failed: {e}",
                R::KIND.plural(),
                query.category_id
            );
            if matches!(e, SourceError::Request { status: 404 }) {
                deps.directory.invalidate().await;
            }
            Ok(Vec::new())
        }
    }
}

fn decode<R: SearchRecord>(raw: Vec<Value>) -> Vec<R> {
    let total = raw.len();
    let records: Vec<R> = raw
        .into_iter()
        .filter_map(R::from_raw)
        .collect();
    if records.len() < total {
        warn!("Skipped {} undecodable {}", total - records.len(), R::KIND.plural());
    }
    records
}
