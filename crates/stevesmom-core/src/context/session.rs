//! Session record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stevesmom_llm::Message;

use super::tokens::estimate_tokens;

/// Session metadata key holding the current summary text
pub(crate) const SUMMARY_KEY: &str = "summary";
/// Session metadata key holding when the session was last summarized
pub(crate) const SUMMARIZED_AT_KEY: &str = "summarized_at";

/// A conversation owned by the context manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (unique within the manager)
    pub session_id: String,
    /// Owning user
    pub user_id: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last message or creation timestamp
    pub last_activity: DateTime<Utc>,
    /// Messages in insertion order
    pub messages: Vec<Message>,
    /// Session metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Session {
    pub(crate) fn new(
        session_id: String,
        user_id: String,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            user_id,
            created_at: now,
            last_activity: now,
            messages: Vec::new(),
            metadata,
        }
    }

    /// Current summary text, if the session has been summarized
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.metadata.get(SUMMARY_KEY).and_then(|v| v.as_str())
    }

    pub(crate) fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            message_count: self.messages.len(),
            estimated_tokens: estimate_tokens(&self.messages),
            has_summary: self.summary().is_some(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Read-only view of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    /// Session ID
    pub session_id: String,
    /// Owning user
    pub user_id: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last activity timestamp
    pub last_activity: DateTime<Utc>,
    /// Number of messages
    pub message_count: usize,
    /// Estimated tokens across all messages
    pub estimated_tokens: usize,
    /// Whether a summary is present
    pub has_summary: bool,
    /// Session metadata
    pub metadata: HashMap<String, serde_json::Value>,
}
