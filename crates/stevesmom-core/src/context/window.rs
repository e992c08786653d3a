//! Token-bounded context window

use serde::Serialize;
use stevesmom_llm::{Message, MessageRole};

use super::tokens::{estimate_message_tokens, estimate_tokens};

/// Messages selected for one provider call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextWindow {
    /// Selected messages, system messages first
    pub messages: Vec<Message>,
    /// Estimated tokens of `messages`
    pub total_tokens: usize,
    /// Budget the window was built for
    pub max_tokens: usize,
    /// Whether anything was left out
    pub truncated: bool,
    /// Session summary, if any
    pub summary: Option<String>,
}

impl ContextWindow {
    /// Check if the window holds no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Select messages within `max_tokens`
///
/// System messages are kept ahead of recency. If they alone exceed the
/// budget the window is empty. Otherwise the newest non-system messages are
/// added until the first one that does not fit.
pub(crate) fn build_window(
    messages: &[Message],
    max_tokens: usize,
    summary: Option<String>,
) -> ContextWindow {
    let total = estimate_tokens(messages);
    if total <= max_tokens {
        return ContextWindow {
            messages: messages.to_vec(),
            total_tokens: total,
            max_tokens,
            truncated: false,
            summary,
        };
    }

    let (system, rest): (Vec<&Message>, Vec<&Message>) = messages
        .iter()
        .partition(|m| m.role == MessageRole::System);

    let system_tokens: usize = system.iter().map(|m| estimate_message_tokens(m)).sum();
    if system_tokens > max_tokens {
        return ContextWindow {
            messages: Vec::new(),
            total_tokens: 0,
            max_tokens,
            truncated: true,
            summary,
        };
    }

    let mut used = system_tokens;
    let mut recent = Vec::new();
    for message in rest.iter().rev() {
        let tokens = estimate_message_tokens(message);
        if used + tokens > max_tokens {
            break;
        }
        used += tokens;
        recent.push(*message);
    }
    recent.reverse();

    ContextWindow {
        messages: system.into_iter().chain(recent).cloned().collect(),
        total_tokens: used,
        max_tokens,
        truncated: true,
        summary,
    }
}
