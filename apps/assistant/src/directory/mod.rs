//! Category Directory: name → id lookup shared by every session of one agent kind.
//!
//! Loaded at most once; a failed load leaves the cache empty so the next turn
//! retries, and `invalidate` forces a reload after a stale-category signal.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::models::category::Category;
use crate::source::{RecordSource, SourceError};

#[derive(Default)]
pub struct CategoryDirectory {
    cached: RwLock<Option<Arc<Vec<Category>>>>,
    // Serializes loads so concurrent sessions trigger one fetch.
    loading: Mutex<()>,
}

impl CategoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the directory, fetching it on first use.
    ///
    /// Only an auth failure is returned as an error. Any other failure yields an
    /// empty directory for this turn and is retried on the next call.
    pub async fn ensure_loaded(
        &self,
        source: &dyn RecordSource,
        token: &str,
    ) -> Result<Arc<Vec<Category>>, SourceError> {
        if let Some(categories) = self.cached.read().await.as_ref() {
            return Ok(Arc::clone(categories));
        }

        let _guard = self.loading.lock().await;
        if let Some(categories) = self.cached.read().await.as_ref() {
            return Ok(Arc::clone(categories));
        }

        match source.fetch_categories(token).await {
            Ok(categories) if categories.is_empty() => {
                warn!("Category directory came back empty; will retry next turn");
                Ok(Arc::new(Vec::new()))
            }
            Ok(categories) => {
                info!("Loaded {} categories", categories.len());
                let categories = Arc::new(categories);
                *self.cached.write().await = Some(Arc::clone(&categories));
                Ok(categories)
            }
            Err(e) if e.is_auth() => Err(e),
            Err(e) => {
                warn!("Category directory load failed: {e}");
                Ok(Arc::new(Vec::new()))
            }
        }
    }

    /// Drops the cached directory so the next `ensure_loaded` refetches.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    #[cfg(test)]
    pub async fn is_loaded(&self) -> bool {
        self.cached.read().await.is_some()
    }
}

/// Case-insensitive exact name match.
pub fn resolve<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    categories
        .iter()
        .find(|c| c.name.trim().to_lowercase() == wanted)
}
