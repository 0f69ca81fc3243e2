//! Model transports used by the toolchain client.
//!
//! [`traits`] defines the request/response contract; [`openai`] implements it
//! against an `OpenAI`-compatible chat-completions endpoint and [`scripted`]
//! replays canned responses for tests.

#![warn(missing_docs, clippy::pedantic)]

pub mod openai;
pub mod scripted;
pub mod traits;

mod http_client;
