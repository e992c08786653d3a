//! Context Manager
//!
//! Owns the session table, builds context windows and runs a background
//! task that drops expired sessions.
//!
//! ## Usage
//!
//! ```ignore
//! let manager = ContextManager::new(ContextConfig::default())?;
//! let session_id = manager.create_session("steve", None, None).await?;
//! manager.add_message(&session_id, MessageRole::User, "hi mom", None).await?;
//! let window = manager.get_context_window(&session_id, None).await?;
//! manager.shutdown().await;
//! ```

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use stevesmom_llm::{Message, MessageContent, MessageRole};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::ContextConfig;
use super::session::{Session, SessionInfo};
use super::summary::{should_summarize, summarize};
use super::window::{build_window, ContextWindow};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct SessionTable {
    sessions: HashMap<String, Session>,
    /// Session IDs per user in creation order
    user_sessions: HashMap<String, Vec<String>>,
}

impl SessionTable {
    fn remove(&mut self, session_id: &str) -> Option<Session> {
        let session = self.sessions.remove(session_id)?;
        if let Some(ids) = self.user_sessions.get_mut(&session.user_id) {
            ids.retain(|id| id != session_id);
            if ids.is_empty() {
                self.user_sessions.remove(&session.user_id);
            }
        }
        Some(session)
    }

    /// Least recently active session of `user_id`; ties go to the older one
    fn least_recent(&self, user_id: &str) -> Option<String> {
        self.user_sessions
            .get(user_id)?
            .iter()
            .filter_map(|id| self.sessions.get(id))
            .min_by_key(|session| session.last_activity)
            .map(|session| session.session_id.clone())
    }
}

#[derive(Debug)]
struct Shared {
    config: ContextConfig,
    table: RwLock<SessionTable>,
}

impl Shared {
    async fn cleanup_expired(&self) -> Result<usize> {
        let max_age = chrono::Duration::from_std(self.config.session_max_age)
            .map_err(|e| Error::invalid_config("session_max_age", e.to_string()))?;
        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            debug!("Session max age reaches past the earliest timestamp, nothing expires");
            return Ok(0);
        };

        let mut table = self.table.write().await;
        let expired: Vec<String> = table
            .sessions
            .values()
            .filter(|session| session.last_activity < cutoff)
            .map(|session| session.session_id.clone())
            .collect();

        for session_id in &expired {
            table.remove(session_id);
        }

        if !expired.is_empty() {
            info!(removed = expired.len(), "Cleaned up expired sessions");
        }
        Ok(expired.len())
    }
}

/// Session lifecycle and context window manager
#[derive(Debug)]
pub struct ContextManager {
    shared: Arc<Shared>,
    cancel_token: CancellationToken,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl ContextManager {
    /// Create a manager
    ///
    /// When called inside a Tokio runtime the periodic cleanup task starts
    /// immediately; otherwise only explicit cleanup runs.
    pub fn new(config: ContextConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            config,
            table: RwLock::new(SessionTable::default()),
        });
        let cancel_token = CancellationToken::new();

        let cleanup_task = match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(cleanup_loop(
                Arc::clone(&shared),
                cancel_token.child_token(),
            ))),
            Err(_) => {
                debug!("No Tokio runtime, background session cleanup disabled");
                None
            }
        };

        Ok(Self {
            shared,
            cancel_token,
            cleanup_task: Mutex::new(cleanup_task),
        })
    }

    /// Create a manager with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(ContextConfig::default())
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.shared.config
    }

    /// Create a session and return its ID
    ///
    /// A random ID is generated when none is given. If the user is at the
    /// session cap, their least recently active session is evicted first.
    pub async fn create_session(
        &self,
        user_id: &str,
        session_id: Option<String>,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<String> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let max = self.shared.config.max_sessions_per_user;

        let mut table = self.shared.table.write().await;
        if table.sessions.contains_key(&session_id) {
            return Err(Error::SessionExists(session_id));
        }

        while table.user_sessions.get(user_id).map_or(0, Vec::len) >= max {
            let Some(oldest) = table.least_recent(user_id) else {
                break;
            };
            table.remove(&oldest);
            info!(user_id = %user_id, session_id = %oldest, "Evicted least recently active session");
        }

        let session = Session::new(
            session_id.clone(),
            user_id.to_string(),
            metadata.unwrap_or_default(),
        );
        table.sessions.insert(session_id.clone(), session);
        table
            .user_sessions
            .entry(user_id.to_string())
            .or_default()
            .push(session_id.clone());

        debug!(user_id = %user_id, session_id = %session_id, "Created session");
        Ok(session_id)
    }

    /// Append a message to a session
    pub async fn add_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: impl Into<MessageContent>,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<()> {
        let mut message = Message::new(role, content);
        if let Some(metadata) = metadata {
            message.metadata = metadata;
        }

        let mut table = self.shared.table.write().await;
        let session = table
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        session.messages.push(message);
        session.last_activity = Utc::now();

        if should_summarize(session, self.shared.config.summarization_threshold) {
            summarize(session);
        }
        Ok(())
    }

    /// Token-bounded window of a session
    ///
    /// `max_tokens` defaults to the configured context budget.
    pub async fn get_context_window(
        &self,
        session_id: &str,
        max_tokens: Option<usize>,
    ) -> Result<ContextWindow> {
        let budget = max_tokens.unwrap_or(self.shared.config.max_context_tokens);
        let table = self.shared.table.read().await;
        let session = table
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        let window = build_window(
            &session.messages,
            budget,
            session.summary().map(str::to_string),
        );
        if window.truncated {
            debug!(
                session_id = %session_id,
                kept = window.messages.len(),
                total = session.messages.len(),
                "Context window truncated"
            );
        }
        Ok(window)
    }

    /// Full message history of a session
    pub async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let table = self.shared.table.read().await;
        table
            .sessions
            .get(session_id)
            .map(|session| session.messages.clone())
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    /// Delete a session, returning whether it existed
    pub async fn delete_session(&self, session_id: &str) -> bool {
        let removed = self.shared.table.write().await.remove(session_id).is_some();
        if removed {
            debug!(session_id = %session_id, "Deleted session");
        }
        removed
    }

    /// Remove sessions inactive for longer than the configured age
    pub async fn cleanup_expired_sessions(&self) -> Result<usize> {
        self.shared.cleanup_expired().await
    }

    /// Read-only view of a session
    pub async fn get_session_info(&self, session_id: &str) -> Option<SessionInfo> {
        let table = self.shared.table.read().await;
        table.sessions.get(session_id).map(Session::info)
    }

    /// Sessions of a user in creation order
    pub async fn list_user_sessions(&self, user_id: &str) -> Vec<SessionInfo> {
        let table = self.shared.table.read().await;
        table
            .user_sessions
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| table.sessions.get(id))
                    .map(Session::info)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.shared.table.read().await.sessions.len()
    }

    /// Stop the background cleanup task and wait for it
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();

        let handle = self.cleanup_task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Session cleanup task ended abnormally");
            }
            info!("Context manager shut down");
        }
    }
}

impl Drop for ContextManager {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn cleanup_loop(shared: Arc<Shared>, cancel_token: CancellationToken) {
    let mut delay = shared.config.cleanup_interval;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Session cleanup task stopped");
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        match shared.cleanup_expired().await {
            Ok(_) => delay = shared.config.cleanup_interval,
            Err(e) => {
                error!(error = %e, "Session cleanup failed, retrying later");
                delay = shared.config.cleanup_retry_interval;
            }
        }
    }
}
