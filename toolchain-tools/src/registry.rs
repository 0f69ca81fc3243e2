//! Runtime registry for tool metadata and execution.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Map, Value};
use thiserror::Error;
use toolchain_primitives::{FunctionSchema, ParametersSchema, ToolSchema};
use tracing::{debug, warn};

use crate::args::ToolArguments;
use crate::schema::ParameterSpec;

/// Error type returned by tool implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for registry operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Trait implemented by tool executors.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool with validated keyword arguments.
    async fn call(&self, args: ToolArguments) -> Result<Value, BoxError>;
}

#[async_trait]
impl<F, Fut> Tool for F
where
    F: Send + Sync + Fn(ToolArguments) -> Fut,
    Fut: Future<Output = Result<Value, BoxError>> + Send,
{
    async fn call(&self, args: ToolArguments) -> Result<Value, BoxError> {
        (self)(args).await
    }
}

/// Adapter that exposes a blocking closure as a [`Tool`].
pub struct SyncTool<F>(F);

impl<F> SyncTool<F>
where
    F: Fn(ToolArguments) -> Result<Value, BoxError> + Send + Sync,
{
    /// Wraps the supplied closure.
    #[must_use]
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Tool for SyncTool<F>
where
    F: Fn(ToolArguments) -> Result<Value, BoxError> + Send + Sync,
{
    async fn call(&self, args: ToolArguments) -> Result<Value, BoxError> {
        (self.0)(args)
    }
}

/// A registered tool: implementation plus everything the model needs to know
/// about it.
#[derive(Clone)]
pub struct ToolEntry {
    name: String,
    description: String,
    params: Vec<ParameterSpec>,
    parameters: ParametersSchema,
    metadata: Map<String, Value>,
    tool: Arc<dyn Tool>,
}

impl fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolEntry")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params", &self.params)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl ToolEntry {
    pub(crate) fn new(
        name: String,
        description: String,
        params: Vec<ParameterSpec>,
        metadata: Map<String, Value>,
        tool: Arc<dyn Tool>,
    ) -> Self {
        let parameters = crate::schema::infer_parameters(&params);
        Self {
            name,
            description,
            params,
            parameters,
            metadata,
            tool,
        }
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the trimmed description; empty when none was supplied.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the declared parameter descriptors.
    #[must_use]
    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    /// Returns the inferred parameter schema.
    #[must_use]
    pub fn parameters(&self) -> &ParametersSchema {
        &self.parameters
    }

    /// Returns the opaque metadata supplied at registration.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns the shared implementation handle.
    #[must_use]
    pub fn tool(&self) -> &Arc<dyn Tool> {
        &self.tool
    }

    /// Exports the entry in the shape expected by the model API.
    #[must_use]
    pub fn schema(&self) -> ToolSchema {
        ToolSchema::function(FunctionSchema::new(
            self.name.clone(),
            self.description.clone(),
            self.parameters.clone(),
        ))
    }

    /// Validates `arguments` and executes the tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Execution`] for invalid arguments, for errors
    /// returned by the implementation, and for panics raised inside it.
    pub async fn invoke(&self, arguments: Value) -> ToolResult<Value> {
        let args = ToolArguments::bind(&self.params, arguments)
            .map_err(|err| ToolError::execution(&self.name, err))?;

        match AssertUnwindSafe(self.tool.call(args)).catch_unwind().await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => Err(ToolError::execution(&self.name, err)),
            Err(panic) => Err(ToolError::execution(&self.name, panic_message(&*panic))),
        }
    }
}

/// Where a `#[tool]` function is defined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceLocation {
    file: &'static str,
    line: u32,
    column: u32,
    module: &'static str,
}

impl SourceLocation {
    /// Records a definition site.
    #[must_use]
    pub const fn new(module: &'static str, file: &'static str, line: u32, column: u32) -> Self {
        Self {
            file,
            line,
            column,
            module,
        }
    }

    /// Module path of the definition.
    #[must_use]
    pub const fn module(&self) -> &'static str {
        self.module
    }

    /// Source file of the definition.
    #[must_use]
    pub const fn file(&self) -> &'static str {
        self.file
    }

    /// Line of the definition.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }
}

/// Link-time registration record emitted by the `#[tool]` attribute.
#[derive(Clone, Copy, Debug)]
pub struct ToolBinding {
    factory: fn() -> ToolEntry,
    location: SourceLocation,
}

impl ToolBinding {
    /// Creates a binding from an entry factory and its definition site.
    #[must_use]
    pub const fn new(factory: fn() -> ToolEntry, location: SourceLocation) -> Self {
        Self { factory, location }
    }

    /// Builds a fresh entry for this binding.
    #[must_use]
    pub fn entry(&self) -> ToolEntry {
        (self.factory)()
    }

    /// Returns the definition site.
    #[must_use]
    pub const fn location(&self) -> SourceLocation {
        self.location
    }
}

inventory::collect!(ToolBinding);

#[derive(Default)]
struct Inner {
    order: Vec<String>,
    entries: HashMap<String, ToolEntry>,
}

/// Registry that stores tool implementations keyed by name.
///
/// Names are unique; registering an existing name replaces the earlier entry
/// in place. Share the registry through an `Arc` where several components
/// need it.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Inner>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("registered", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every `#[tool]` function linked into the
    /// current binary.
    #[must_use]
    pub fn collected() -> Self {
        let registry = Self::new();
        registry.register_collected();
        registry
    }

    /// Registers an entry, returning the entry it replaced, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register(&self, entry: ToolEntry) -> Option<ToolEntry> {
        let mut inner = self.write();
        let name = entry.name().to_owned();
        let previous = inner.entries.insert(name.clone(), entry);

        if previous.is_some() {
            debug!(tool = %name, "replaced registered tool");
        } else {
            debug!(tool = %name, "registered tool");
            inner.order.push(name);
        }

        previous
    }

    /// Registers the entry produced by a `#[tool]` binding.
    pub fn register_binding(&self, binding: &ToolBinding) -> Option<ToolEntry> {
        self.register(binding.entry())
    }

    /// Registers every `#[tool]` binding linked into the binary, returning how
    /// many were registered.
    ///
    /// Bindings are registered in definition order: by source file, then by
    /// position within the file.
    pub fn register_collected(&self) -> usize {
        let mut bindings: Vec<&ToolBinding> =
            inventory::iter::<ToolBinding>.into_iter().collect();
        bindings.sort_by_key(|binding| binding.location);
        for binding in &bindings {
            self.register_binding(binding);
        }
        bindings.len()
    }

    /// Returns the entry registered under `name`.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn get_tool(&self, name: &str) -> Option<ToolEntry> {
        self.read().entries.get(name).cloned()
    }

    /// Whether a tool with the given name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.read().entries.contains_key(name)
    }

    /// Invokes a registered tool with a keyword argument object.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] when no tool has that name, and
    /// [`ToolError::Execution`] for every failure inside the tool.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResult<Value> {
        let entry = self.get_tool(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_owned(),
        })?;

        debug!(tool = name, "calling tool");
        let result = entry.invoke(arguments).await;
        if let Err(err) = &result {
            warn!(tool = name, error = %err, "tool call failed");
        }
        result
    }

    /// Exports every tool in registration order.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|name| inner.entries.get(name))
            .map(ToolEntry::schema)
            .collect()
    }

    /// Returns registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.read().order.clone()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    /// Removes every registered tool.
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.order.clear();
        inner.entries.clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("tool registry poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("tool registry poisoned")
    }
}

/// Errors produced by tool lookup and invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Requested tool does not exist.
    #[error("tool '{name}' not found")]
    NotFound {
        /// Name of the missing tool.
        name: String,
    },

    /// The tool failed: bad arguments, an error result, or a panic.
    #[error("error calling tool '{name}': {message}")]
    Execution {
        /// Name of the failing tool.
        name: String,
        /// Message of the original error.
        message: String,
        /// The original error.
        #[source]
        source: BoxError,
    },
}

impl ToolError {
    /// Wraps `source` as an execution failure of the named tool.
    #[must_use]
    pub fn execution(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self::Execution {
            name: name.into(),
            message: source.to_string(),
            source,
        }
    }

    /// Returns the name of the tool the error refers to.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        match self {
            Self::NotFound { name } | Self::Execution { name, .. } => name,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("tool panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("tool panicked: {message}")
    } else {
        "tool panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::builder::ToolBuilder;

    fn add() -> ToolEntry {
        ToolBuilder::new("add")
            .description("Add two numbers.")
            .param("a", "i64")
            .param_with_default("b", "i64", json!(1))
            .build_sync(|args| {
                let a: i64 = args.get("a")?;
                let b: i64 = args.get("b")?;
                Ok(json!(a + b))
            })
    }

    fn failing() -> ToolEntry {
        ToolBuilder::new("explode").build_sync(|_| Err("boom".into()))
    }

    #[tokio::test]
    async fn register_and_call_tool() {
        let registry = ToolRegistry::new();
        registry.register(add());

        let output = registry.call_tool("add", json!({"a": 2, "b": 3})).await.unwrap();
        assert_eq!(output, json!(5));

        let defaulted = registry.call_tool("add", json!({"a": 2})).await.unwrap();
        assert_eq!(defaulted, json!(3));
    }

    #[tokio::test]
    async fn async_closures_register_directly() {
        let registry = ToolRegistry::new();
        ToolBuilder::new("echo")
            .param("message", "String")
            .register(&registry, |args: ToolArguments| async move {
                Ok::<_, BoxError>(args.into_value())
            });

        let payload = json!({"message": "hello"});
        let output = registry.call_tool("echo", payload.clone()).await.unwrap();
        assert_eq!(output, payload);
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let registry = ToolRegistry::new();
        let err = registry
            .call_tool("missing", Value::Null)
            .await
            .expect_err("unknown tool should error");

        assert!(matches!(err, ToolError::NotFound { ref name } if name == "missing"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn execution_errors_carry_tool_name_and_source() {
        let registry = ToolRegistry::new();
        registry.register(failing());

        let err = registry
            .call_tool("explode", json!({}))
            .await
            .expect_err("failing tool should error");

        assert_eq!(err.to_string(), "error calling tool 'explode': boom");
        assert_eq!(err.tool_name(), "explode");
        let source = std::error::Error::source(&err).expect("source preserved");
        assert_eq!(source.to_string(), "boom");
    }

    #[tokio::test]
    async fn argument_mismatch_is_an_execution_error() {
        let registry = ToolRegistry::new();
        registry.register(add());

        let err = registry
            .call_tool("add", json!({"b": 3}))
            .await
            .expect_err("missing argument should error");

        assert!(matches!(err, ToolError::Execution { .. }));
        assert!(err.to_string().contains("'add'"));
        assert!(err.to_string().contains("missing required argument `a`"));
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let registry = ToolRegistry::new();
        ToolBuilder::new("panicky")
            .register_sync(&registry, |_| panic!("kaboom"));

        let err = registry
            .call_tool("panicky", json!({}))
            .await
            .expect_err("panic should surface as error");

        assert!(err.to_string().contains("tool panicked: kaboom"));
    }

    #[tokio::test]
    async fn repeated_calls_are_idempotent_for_pure_tools() {
        let registry = ToolRegistry::new();
        registry.register(add());

        let first = registry.call_tool("add", json!({"a": 4, "b": 5})).await.unwrap();
        let second = registry.call_tool("add", json!({"a": 4, "b": 5})).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn re_registration_overwrites_in_place() {
        let registry = ToolRegistry::new();
        registry.register(add());
        registry.register(failing());

        let replacement = ToolBuilder::new("add")
            .description("Replacement.")
            .build_sync(|_| Ok(Value::Null));
        let previous = registry.register(replacement);

        assert_eq!(previous.unwrap().description(), "Add two numbers.");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), ["add", "explode"]);
        assert_eq!(registry.get_tool("add").unwrap().description(), "Replacement.");
    }

    #[test]
    fn schemas_follow_registration_order() {
        let registry = ToolRegistry::new();
        registry.register(failing());
        registry.register(add());

        let schemas = registry.get_tool_schemas();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].function_schema().name(), "explode");
        assert_eq!(schemas[1].function_schema().name(), "add");

        let value = serde_json::to_value(&schemas[1]).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["parameters"]["properties"]["a"]["type"], "number");
        assert_eq!(value["function"]["parameters"]["required"], json!(["a"]));
    }

    #[test]
    fn definition_sites_order_by_file_then_position() {
        let mut sites = [
            SourceLocation::new("demo::b", "src/b.rs", 3, 1),
            SourceLocation::new("demo::a", "src/a.rs", 40, 1),
            SourceLocation::new("demo::a", "src/a.rs", 12, 5),
            SourceLocation::new("demo::a::inner", "src/a.rs", 12, 1),
        ];
        sites.sort();

        let order: Vec<_> = sites.iter().map(|site| (site.file(), site.line())).collect();
        assert_eq!(
            order,
            [
                ("src/a.rs", 12),
                ("src/a.rs", 12),
                ("src/a.rs", 40),
                ("src/b.rs", 3),
            ]
        );
        assert_eq!(sites[0].module(), "demo::a::inner");
    }

    #[test]
    fn get_tool_returns_shared_handle() {
        let registry = ToolRegistry::new();
        let entry = add();
        registry.register(entry.clone());

        let fetched = registry.get_tool("add").unwrap();
        assert!(Arc::ptr_eq(fetched.tool(), entry.tool()));
        assert!(registry.get_tool("nonexistent").is_none());
    }

    #[test]
    fn clear_empties_exports() {
        let registry = ToolRegistry::new();
        registry.register(add());
        registry.clear();

        assert!(registry.get_tool_schemas().is_empty());
        assert!(!registry.contains("add"));
    }
}
