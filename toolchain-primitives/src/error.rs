//! Shared error definitions for toolchain primitives.

use thiserror::Error;

/// Result alias used throughout the toolchain primitives.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while interpreting wire-level values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The serialized arguments attached to a tool call could not be decoded
    /// into a keyword mapping.
    #[error("failed to parse arguments for tool '{tool}' (call `{call_id}`): {reason}")]
    ArgumentParse {
        /// Identifier of the offending tool call.
        call_id: String,
        /// Name of the tool the model tried to call.
        tool: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
