//! Context - Conversation sessions and context windows
//!
//! # Module Structure
//!
//! - `config`: Manager limits and timings
//! - `session`: Session record and info view
//! - `tokens`: Heuristic token estimation
//! - `window`: Token-bounded context window selection
//! - `summary`: In-place summarization of long sessions
//! - `manager`: ContextManager and its background cleanup task

mod config;
mod manager;
mod session;
mod summary;
mod tokens;
mod window;

pub use config::ContextConfig;
pub use manager::ContextManager;
pub use session::{Session, SessionInfo};
pub use tokens::{estimate_message_tokens, estimate_tokens};
pub use window::ContextWindow;
