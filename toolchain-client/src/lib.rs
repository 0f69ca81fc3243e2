//! Tool-calling conversation client.
//!
//! [`ToolClient`] sends a transcript to a [`ChatModel`](toolchain_adapters::traits::ChatModel),
//! executes the tool calls the model requests against a shared
//! [`ToolRegistry`](toolchain_tools::ToolRegistry), feeds the results back and
//! repeats until the model answers in text or the round budget runs out.

#![warn(missing_docs, clippy::pedantic)]

mod client;
mod conversation;
mod error;

pub use client::ToolClient;
pub use conversation::{Conversation, ConversationOutcome, ToolCallRecord};
pub use error::{ClientError, ClientResult};
