//! Expose Rust functions as `OpenAI` function-calling tools.
//!
//! This crate bundles the toolchain crates behind feature flags:
//!
//! ```ignore
//! use std::sync::Arc;
//! use openai_toolchain::{adapters::openai::OpenAiAdapter, client::ToolClient, tools::tool};
//! use openai_toolchain::{config::ToolchainConfig, primitives::ChatMessage, tools::ToolRegistry};
//!
//! /// Get the current weather in a given location.
//! #[tool(crate = "openai_toolchain::tools")]
//! fn get_weather(location: String) -> String {
//!     format!("Sunny in {location}")
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ToolchainConfig::from_env()?;
//! let adapter = Arc::new(OpenAiAdapter::new(config.adapter_config()?)?);
//! let client = ToolClient::new(adapter, Arc::new(ToolRegistry::collected()));
//! let answer = client
//!     .chat_with_tools(vec![ChatMessage::user("Weather in Oslo?")], config.max_tool_calls(), None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, clippy::pedantic)]

/// Chat messages, tool calls and schema shapes.
pub use toolchain_primitives as primitives;

/// Tool registry, `#[tool]` and schema inference (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use toolchain_tools as tools;

/// Chat model transports (enabled by `adapters` feature).
#[cfg(feature = "adapters")]
pub use toolchain_adapters as adapters;

/// Tool-calling conversation loop (enabled by `client` feature).
#[cfg(feature = "client")]
pub use toolchain_client as client;

/// Environment configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use toolchain_config as config;
