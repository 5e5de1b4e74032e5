use std::sync::Arc;

use crate::agent::SearchService;
use crate::chat::history::MessageLog;
use crate::config::Config;
use crate::models::record::{Candidate, Job};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub message_log: Arc<dyn MessageLog>,
    /// Candidate search for employers and admins.
    pub candidates: SearchService<Candidate>,
    /// Job search for job seekers.
    pub jobs: SearchService<Job>,
}
