//! In-place summarization of long sessions
//!
//! Every tenth message, once a session is estimated above the threshold,
//! everything but the most recent messages is replaced by one system message
//! tagged `type = "summary"`. Lines of an earlier summary are carried into
//! the new one, so at most one summary message ever exists.

use chrono::Utc;
use serde_json::Value;
use stevesmom_llm::{Message, MessageRole};
use tracing::debug;

use super::session::{Session, SUMMARIZED_AT_KEY, SUMMARY_KEY};
use super::tokens::estimate_tokens;

/// Messages kept verbatim after summarization
pub(crate) const KEEP_RECENT: usize = 10;
/// Summarization runs only on multiples of this message count
const SUMMARIZE_EVERY: usize = 10;
/// Lines kept in a summary
const SUMMARY_LINES: usize = 5;
/// Characters of message text kept per summary line
const LINE_CHARS: usize = 100;

const METADATA_TYPE: &str = "type";
const SUMMARY_TYPE: &str = "summary";

pub(crate) fn should_summarize(session: &Session, threshold: usize) -> bool {
    let count = session.messages.len();
    count > KEEP_RECENT
        && count % SUMMARIZE_EVERY == 0
        && estimate_tokens(&session.messages) > threshold
}

pub(crate) fn is_summary(message: &Message) -> bool {
    message.role == MessageRole::System
        && message.metadata.get(METADATA_TYPE).and_then(Value::as_str) == Some(SUMMARY_TYPE)
}

pub(crate) fn summarize(session: &mut Session) {
    let split = session.messages.len().saturating_sub(KEEP_RECENT);
    let recent = session.messages.split_off(split);
    let older = std::mem::take(&mut session.messages);

    let mut lines: Vec<String> = Vec::new();
    for message in &older {
        if is_summary(message) {
            lines.extend(message.text().lines().map(str::to_string));
            continue;
        }
        let prefix = match message.role {
            MessageRole::User => "User asked: ",
            MessageRole::Assistant => "Assistant replied: ",
            MessageRole::System | MessageRole::Tool => continue,
        };
        lines.push(format!("{prefix}{}", truncate(&message.text(), LINE_CHARS)));
    }

    let keep_from = lines.len().saturating_sub(SUMMARY_LINES);
    let summary = lines[keep_from..].join("\n");

    let mut messages = Vec::with_capacity(recent.len() + 1);
    messages.push(
        Message::system(summary.clone())
            .with_metadata(METADATA_TYPE, Value::String(SUMMARY_TYPE.to_string())),
    );
    messages.extend(recent.into_iter().filter(|m| !is_summary(m)));
    session.messages = messages;

    session
        .metadata
        .insert(SUMMARY_KEY.to_string(), Value::String(summary));
    session.metadata.insert(
        SUMMARIZED_AT_KEY.to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );

    debug!(
        session_id = %session.session_id,
        replaced = older.len(),
        kept = session.messages.len(),
        "Summarized session"
    );
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
