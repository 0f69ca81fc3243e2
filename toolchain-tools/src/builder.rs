//! Fluent construction of [`ToolEntry`] values.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::args::ToolArguments;
use crate::registry::{BoxError, SyncTool, Tool, ToolEntry, ToolRegistry};
use crate::schema::ParameterSpec;

/// Builder for tools registered without the `#[tool]` attribute.
///
/// ```
/// use serde_json::json;
/// use toolchain_tools::{ToolBuilder, ToolRegistry};
///
/// let registry = ToolRegistry::new();
/// ToolBuilder::new("get_forecast")
///     .description("Get the weather forecast for a location.")
///     .param("location", "String")
///     .param_with_default("days", "u32", json!(1))
///     .register_sync(&registry, |args| Ok(json!({ "days": args.get::<u32>("days")? })));
///
/// assert!(registry.contains("get_forecast"));
/// ```
#[derive(Debug, Clone)]
pub struct ToolBuilder {
    name: String,
    description: String,
    params: Vec<ParameterSpec>,
    metadata: Map<String, Value>,
}

impl ToolBuilder {
    /// Starts a tool with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            params: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Sets the description. Surrounding whitespace is trimmed.
    #[must_use]
    pub fn description(mut self, description: impl AsRef<str>) -> Self {
        description.as_ref().trim().clone_into(&mut self.description);
        self
    }

    /// Appends a parameter. A parameter with the same name is replaced in place.
    #[must_use]
    pub fn parameter(mut self, spec: ParameterSpec) -> Self {
        match self.params.iter_mut().find(|param| param.name() == spec.name()) {
            Some(existing) => *existing = spec,
            None => self.params.push(spec),
        }
        self
    }

    /// Appends a parameter with a type annotation.
    ///
    /// The parameter is required unless the annotation is an `Option<..>`,
    /// which defaults to `null`.
    #[must_use]
    pub fn param(self, name: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.parameter(ParameterSpec::new(name).with_annotation(annotation))
    }

    /// Appends an optional parameter with a type annotation and default value.
    #[must_use]
    pub fn param_with_default(
        self,
        name: impl Into<String>,
        annotation: impl Into<String>,
        default: Value,
    ) -> Self {
        self.parameter(
            ParameterSpec::new(name)
                .with_annotation(annotation)
                .with_default(default),
        )
    }

    /// Attaches an opaque metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Finishes the entry with an asynchronous implementation.
    #[must_use]
    pub fn build<T>(self, tool: T) -> ToolEntry
    where
        T: Tool + 'static,
    {
        ToolEntry::new(
            self.name,
            self.description,
            self.params,
            self.metadata,
            Arc::new(tool),
        )
    }

    /// Finishes the entry with a blocking implementation.
    #[must_use]
    pub fn build_sync<F>(self, f: F) -> ToolEntry
    where
        F: Fn(ToolArguments) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.build(SyncTool::new(f))
    }

    /// Builds the entry and registers it, returning any entry it replaced.
    pub fn register<T>(self, registry: &ToolRegistry, tool: T) -> Option<ToolEntry>
    where
        T: Tool + 'static,
    {
        registry.register(self.build(tool))
    }

    /// Builds the entry from a blocking closure and registers it.
    pub fn register_sync<F>(self, registry: &ToolRegistry, f: F) -> Option<ToolEntry>
    where
        F: Fn(ToolArguments) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        registry.register(self.build_sync(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_schema_and_metadata() {
        let entry = ToolBuilder::new("get_weather")
            .description("\n    Get the current weather in a given location.\n    ")
            .param("location", "String")
            .param_with_default("unit", "String", json!("celsius"))
            .metadata("category", "weather")
            .build_sync(|args| Ok(args.into_value()));

        assert_eq!(entry.name(), "get_weather");
        assert_eq!(entry.description(), "Get the current weather in a given location.");
        assert_eq!(entry.metadata()["category"], json!("weather"));
        assert_eq!(entry.parameters().required(), ["location".to_owned()]);
    }

    #[test]
    fn missing_description_is_empty() {
        let entry = ToolBuilder::new("noop").build_sync(|_| Ok(Value::Null));
        assert_eq!(entry.description(), "");
        assert!(entry.parameters().properties().is_empty());
    }

    #[test]
    fn redeclared_parameter_replaces_earlier() {
        let entry = ToolBuilder::new("count")
            .param("n", "String")
            .param("other", "bool")
            .param("n", "u8")
            .build_sync(|_| Ok(Value::Null));

        let names: Vec<_> = entry.params().iter().map(ParameterSpec::name).collect();
        assert_eq!(names, ["n", "other"]);
        assert_eq!(entry.params()[0].annotation(), Some("u8"));
    }

    #[tokio::test]
    async fn option_parameter_matches_attribute_form() {
        let entry = ToolBuilder::new("shout")
            .param("text", "&str")
            .param("suffix", "Option<String>")
            .build_sync(|args| {
                let text: String = args.get("text")?;
                let suffix: Option<String> = args.get("suffix")?;
                Ok(json!(format!("{}{}", text.to_uppercase(), suffix.unwrap_or_default())))
            });

        assert_eq!(entry.parameters().required(), ["text".to_owned()]);
        let output = entry
            .invoke(json!({"text": "hi", "suffix": null}))
            .await
            .unwrap();
        assert_eq!(output, json!("HI"));
    }
}
