//! Tool registration and dispatch for `OpenAI` function calling.
//!
//! Tools are registered either through [`ToolBuilder`] or by annotating a
//! plain function with [`tool`]. The [`ToolRegistry`] exports every tool in the
//! chat-completions `tools` shape and executes calls by name with validated
//! keyword arguments.

#![warn(missing_docs, clippy::pedantic)]

pub mod args;
pub mod builder;
pub mod registry;
pub mod schema;

pub use args::{ArgumentError, ToolArguments};
pub use builder::ToolBuilder;
pub use registry::{
    BoxError, SourceLocation, SyncTool, Tool, ToolBinding, ToolEntry, ToolError, ToolRegistry,
    ToolResult,
};
pub use schema::{ParameterSpec, infer_parameters, infer_type};
/// Attribute that turns a function into a registered tool.
pub use toolchain_tools_macros::tool;

#[doc(hidden)]
pub mod __private {
    pub use inventory;
    pub use serde_json;

    use serde::Serialize;
    use serde_json::Value;

    use crate::BoxError;

    /// Serializes a tool's return value.
    ///
    /// # Errors
    ///
    /// Fails when the value cannot be represented as JSON.
    pub fn to_output<T: Serialize>(value: T) -> Result<Value, BoxError> {
        serde_json::to_value(value).map_err(Into::into)
    }
}
