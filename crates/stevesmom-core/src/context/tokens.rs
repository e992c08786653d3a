//! Heuristic token estimation
//!
//! Roughly four characters per token plus a fixed per-message overhead.
//! Content, role and serialized metadata all count toward the characters.

use stevesmom_llm::Message;

const CHARS_PER_TOKEN: usize = 4;
const MESSAGE_OVERHEAD: usize = 4;

/// Estimated tokens of one message
#[must_use]
pub fn estimate_message_tokens(message: &Message) -> usize {
    let metadata_chars = if message.metadata.is_empty() {
        0
    } else {
        serde_json::to_string(&message.metadata)
            .map(|json| json.chars().count())
            .unwrap_or(0)
    };

    let chars = message.content.char_len() + message.role.as_str().len() + metadata_chars;
    chars / CHARS_PER_TOKEN + MESSAGE_OVERHEAD
}

/// Estimated tokens of a message list
#[must_use]
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
