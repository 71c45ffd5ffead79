//! Minimal LLM client.
//!
//! Two entry points: [`LlmClient::chat_completion`] for free text and
//! [`LlmClient::extract`] for structured output. Extraction forces a tool
//! call against the schemars-derived schema of the target type; if the model
//! answers in prose anyway, [`recover_json`] salvages an embedded JSON
//! object before the call is reported as failed.

mod client;
mod extract;
mod types;
pub mod util;

pub use client::LlmClient;
pub use extract::{recover_json, StructuredOutput};
pub use types::{
    ChatRequest, ChatResponse, ContentBlock, Role, ToolDefinitionWire, Usage, WireMessage,
};
