use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::conversation::ConversationSession;
use crate::error::Result;

/// Trait for storing and retrieving conversation sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: ConversationSession) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<ConversationSession>>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// Removes expired sessions and returns how many were dropped.
    async fn purge_expired(&self) -> Result<usize>;
}

struct StoredSession {
    session: ConversationSession,
    saved_at: Instant,
}

/// In-memory implementation of SessionStore.
///
/// With a TTL, a session that has not been saved for longer than the TTL is invisible to
/// `get` and is dropped by the next `purge_expired`.
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, StoredSession>>,
    ttl: Option<Duration>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    /// A store whose sessions never expire.
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl: None,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl: Some(ttl),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn is_expired(&self, stored: &StoredSession) -> bool {
        self.ttl.is_some_and(|ttl| stored.saved_at.elapsed() > ttl)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: ConversationSession) -> Result<()> {
        self.sessions.insert(
            session.id.clone(),
            StoredSession {
                session,
                saved_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ConversationSession>> {
        Ok(self
            .sessions
            .get(id)
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| entry.session.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        if self.ttl.is_none() {
            return Ok(0);
        }
        let before = self.sessions.len();
        self.sessions.retain(|_, stored| !self.is_expired(stored));
        Ok(before.saturating_sub(self.sessions.len()))
    }
}

/// Runs `purge_expired` on `store` every `every` until the returned task is aborted.
pub fn spawn_eviction(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    let every = every.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(evicted) => debug!(evicted, "Evicted expired sessions"),
                Err(e) => warn!(error = %e, "Session eviction failed"),
            }
        }
    })
}
