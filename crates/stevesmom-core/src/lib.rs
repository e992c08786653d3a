//! Steve's Mom Core - Conversation context management
//!
//! This crate provides the session side of the Steve's Mom core:
//! - Context: Session lifecycle, token-bounded context windows,
//!   summarization of long conversations and background expiry
//!
//! Provider routing lives in `stevesmom-llm`; a context window produced here
//! is what callers hand to [`stevesmom_llm::ModelRouter::route_request`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod error;

pub use context::{
    estimate_message_tokens, estimate_tokens, ContextConfig, ContextManager, ContextWindow,
    Session, SessionInfo,
};
pub use error::{Error, Result};
