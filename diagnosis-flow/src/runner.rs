//! ConversationRunner: load a session, run one conversation step, save it back.
//!
//! Every call for a given session id runs under that id's async mutex, so two requests for
//! the same session are serialized and neither loses the other's transcript entries or
//! symptoms. Different sessions proceed in parallel.
//!
//! ```rust,ignore
//! // At startup
//! let runner = ConversationRunner::new(engine, Arc::new(InMemorySessionStore::new()));
//!
//! // In request handlers
//! let greeting = runner.start_chat(&session_id).await?;
//! let reply = runner.process_message(&session_id, &text).await?;
//! let summary = runner.get_summary(&session_id).await?;
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::conversation::{ChatReply, ConversationEngine, SummaryResult};
use crate::error::{FlowError, Result};
use crate::storage::SessionStore;

pub const MAX_SESSION_ID_LEN: usize = 128;

/// Rejects blank ids, ids longer than [`MAX_SESSION_ID_LEN`] and ids with control characters.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.trim().is_empty() {
        return Err(FlowError::InvalidSessionId("session id is empty".into()));
    }
    if session_id.chars().count() > MAX_SESSION_ID_LEN {
        return Err(FlowError::InvalidSessionId(format!(
            "session id is longer than {MAX_SESSION_ID_LEN} characters"
        )));
    }
    if session_id.chars().any(char::is_control) {
        return Err(FlowError::InvalidSessionId(
            "session id contains control characters".into(),
        ));
    }
    Ok(())
}

/// High-level helper that orchestrates the _load → step → save_ pattern for conversations.
#[derive(Clone)]
pub struct ConversationRunner {
    engine: Arc<ConversationEngine>,
    store: Arc<dyn SessionStore>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationRunner {
    pub fn new(engine: Arc<ConversationEngine>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            engine,
            store,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Drops the lock entry once no other call holds or waits on it.
    fn release(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(session_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Starts (or restarts) a session and returns the greeting.
    #[instrument(skip(self))]
    pub async fn start_chat(&self, session_id: &str) -> Result<ChatReply> {
        validate_session_id(session_id)?;
        let lock = self.lock_for(session_id);
        let result = {
            let _guard = lock.lock().await;
            self.start_locked(session_id).await
        };
        self.release(session_id, lock);
        result
    }

    async fn start_locked(&self, session_id: &str) -> Result<ChatReply> {
        let (session, reply) = self.engine.start(session_id);
        self.store.save(session).await?;
        Ok(reply)
    }

    /// Runs one conversation step. An unknown session is started fresh and answered with
    /// the greeting.
    #[instrument(skip(self, user_message))]
    pub async fn process_message(&self, session_id: &str, user_message: &str) -> Result<ChatReply> {
        validate_session_id(session_id)?;
        if user_message.trim().is_empty() {
            return Err(FlowError::EmptyMessage);
        }

        let lock = self.lock_for(session_id);
        let result = {
            let _guard = lock.lock().await;
            match self.store.get(session_id).await {
                Ok(Some(mut session)) => {
                    let reply = self.engine.step(&mut session, user_message);
                    self.store.save(session).await.map(|_| reply)
                }
                Ok(None) => {
                    info!(session_id = %session_id, "Unknown session, starting a new one");
                    self.start_locked(session_id).await
                }
                Err(e) => Err(e),
            }
        };
        self.release(session_id, lock);
        result
    }

    /// Summarizes a session, predicting first if needed.
    #[instrument(skip(self))]
    pub async fn get_summary(&self, session_id: &str) -> Result<SummaryResult> {
        validate_session_id(session_id)?;
        let lock = self.lock_for(session_id);
        let result = {
            let _guard = lock.lock().await;
            match self.store.get(session_id).await {
                Ok(Some(mut session)) => {
                    let summary = self.engine.summarize(&mut session);
                    self.store.save(session).await.map(|_| summary)
                }
                Ok(None) => Err(FlowError::SessionNotFound(session_id.to_string())),
                Err(e) => Err(e),
            }
        };
        self.release(session_id, lock);
        result
    }
}
