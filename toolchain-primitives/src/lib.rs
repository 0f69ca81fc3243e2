//! Core shared types for the `OpenAI` toolchain.
//!
//! Everything here mirrors the chat-completions wire format: role-tagged
//! messages, model-issued tool calls, and the `{type: "function", ...}` schema
//! shape advertised in the `tools` request parameter.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod message;
mod schema;

/// Error type and result alias shared across the toolchain.
pub use error::{Error, Result};
/// Chat transcript entries and model-issued tool calls.
pub use message::{ChatMessage, FunctionCall, MessageRole, ToolCall};
/// Schema shapes exported to the model API.
pub use schema::{FunctionSchema, ParamType, ParametersSchema, PropertySchema, ToolSchema};
