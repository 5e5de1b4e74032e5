//! Session-keyed registry of per-conversation agent instances.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

struct Entry<A> {
    agent: Arc<Mutex<A>>,
    last_used: Instant,
}

/// Owns one agent per session id. Agents are handed out behind their own
/// mutex; an entry that is still borrowed by a running turn is never swept.
pub struct SessionRegistry<A> {
    entries: Mutex<HashMap<Uuid, Entry<A>>>,
}

impl<A> Default for SessionRegistry<A> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<A> SessionRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, session_id: Uuid, create: impl FnOnce() -> A) -> Arc<Mutex<A>> {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(session_id).or_insert_with(|| Entry {
            agent: Arc::new(Mutex::new(create())),
            last_used: Instant::now(),
        });
        entry.last_used = Instant::now();
        Arc::clone(&entry.agent)
    }

    pub async fn evict(&self, session_id: Uuid) -> bool {
        self.entries.lock().await.remove(&session_id).is_some()
    }

    /// Drops agents unused for longer than `ttl`. Returns how many went.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| {
            Arc::strong_count(&entry.agent) > 1 || now.duration_since(entry.last_used) <= ttl
        });
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
