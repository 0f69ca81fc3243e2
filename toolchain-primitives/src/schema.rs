//! Tool schema shapes advertised to the model API.
//!
//! The serialized form is exactly what the chat-completions `tools` parameter
//! expects:
//!
//! ```json
//! {"type": "function",
//!  "function": {"name": "...", "description": "...",
//!               "parameters": {"type": "object", "properties": {...}, "required": [...]}}}
//! ```

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Type tag attached to a single tool parameter.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Text values. Also the fallback for anything unrecognized.
    String,
    /// Integer or floating point values.
    Number,
    /// `true` / `false`.
    Boolean,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        })
    }
}

/// Schema of one named parameter.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PropertySchema {
    #[serde(skip)]
    name: String,
    #[serde(rename = "type")]
    kind: ParamType,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
}

impl PropertySchema {
    /// Creates a property with the supplied name and type tag.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            default: None,
        }
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Records the default value used when the caller omits the parameter.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the type tag.
    #[must_use]
    pub const fn kind(&self) -> ParamType {
        self.kind
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the default value, if any. A JSON `null` default is distinct
    /// from having no default at all.
    #[must_use]
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Object-properties description of a tool's parameter list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParametersSchema {
    properties: Vec<PropertySchema>,
    required: Vec<String>,
}

impl ParametersSchema {
    /// Creates a schema from ordered properties and the names that must be
    /// supplied.
    #[must_use]
    pub fn new(properties: Vec<PropertySchema>, required: Vec<String>) -> Self {
        Self {
            properties,
            required,
        }
    }

    /// Returns the properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[PropertySchema] {
        &self.properties
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|property| property.name == name)
    }

    /// Returns the required parameter names in declaration order.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }
}

impl Serialize for ParametersSchema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.required.is_empty() { 2 } else { 3 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("type", "object")?;
        map.serialize_entry("properties", &Properties(&self.properties))?;
        if !self.required.is_empty() {
            map.serialize_entry("required", &self.required)?;
        }
        map.end()
    }
}

struct Properties<'a>(&'a [PropertySchema]);

impl Serialize for Properties<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for property in self.0 {
            map.serialize_entry(&property.name, property)?;
        }
        map.end()
    }
}

/// Name, description, and parameters of an exported function.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct FunctionSchema {
    name: String,
    description: String,
    parameters: ParametersSchema,
}

impl FunctionSchema {
    /// Creates a function description.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParametersSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the function description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the parameter schema.
    #[must_use]
    pub fn parameters(&self) -> &ParametersSchema {
        &self.parameters
    }
}

/// A single entry of the `tools` request parameter.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionSchema,
}

impl ToolSchema {
    /// Wraps a function description as a `"function"` tool.
    #[must_use]
    pub fn function(function: FunctionSchema) -> Self {
        Self {
            kind: "function",
            function,
        }
    }

    /// Returns the tool kind (always `"function"`).
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// Returns the wrapped function description.
    #[must_use]
    pub fn function_schema(&self) -> &FunctionSchema {
        &self.function
    }
}
