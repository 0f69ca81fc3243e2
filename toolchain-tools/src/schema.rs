//! Schema inference from declared parameter lists.
//!
//! Tools describe their parameters with [`ParameterSpec`] descriptors. The
//! descriptors carry the type annotation as text (for `#[tool]` functions, the
//! Rust type exactly as written), and [`infer_parameters`] maps them to the
//! object-properties schema sent to the model.

use serde_json::Value;
use toolchain_primitives::{ParamType, ParametersSchema, PropertySchema};

const RECEIVER: &str = "self";

/// Declarative description of one tool parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSpec {
    name: String,
    annotation: Option<String>,
    description: Option<String>,
    default: Option<Value>,
}

impl ParameterSpec {
    /// Creates an unannotated, required parameter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: None,
            description: None,
            default: None,
        }
    }

    /// Records the declared type annotation, e.g. `String`, `Option<u32>` or `int`.
    ///
    /// Blank annotations are ignored. An `Option<..>` annotation defaults to
    /// `null` unless a default is already set.
    #[must_use]
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        let annotation = annotation.into();
        let annotation = annotation.trim();
        self.annotation = (!annotation.is_empty()).then(|| annotation.to_owned());
        if self.default.is_none() && is_option(annotation) {
            self.default = Some(Value::Null);
        }
        self
    }

    /// Sets an explicit description, taking precedence over the annotation text.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the default value, making the parameter optional.
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

    /// Returns the declared annotation, if any.
    #[must_use]
    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    /// Returns the explicit description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the default value, if any.
    #[must_use]
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Whether callers must supply this parameter.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Type tag recognized from the annotation, or `None` when the annotation
    /// is absent or unknown.
    #[must_use]
    pub fn declared_kind(&self) -> Option<ParamType> {
        self.annotation.as_deref().and_then(infer_type)
    }

    /// Type tag advertised to the model. Falls back to [`ParamType::String`].
    #[must_use]
    pub fn kind(&self) -> ParamType {
        self.declared_kind().unwrap_or(ParamType::String)
    }

    pub(crate) fn is_receiver(&self) -> bool {
        self.name == RECEIVER
    }
}

/// Builds the parameters schema for the supplied descriptors.
///
/// A parameter named `self` is skipped. Unannotated parameters are typed as
/// strings, and every parameter without a default is listed as required.
#[must_use]
pub fn infer_parameters(params: &[ParameterSpec]) -> ParametersSchema {
    let mut properties = Vec::with_capacity(params.len());
    let mut required = Vec::new();

    for param in params.iter().filter(|param| !param.is_receiver()) {
        let mut property = PropertySchema::new(param.name(), param.kind());

        if let Some(description) = param.description().or(param.annotation()) {
            property = property.with_description(description);
        }

        match param.default() {
            Some(default) => property = property.with_default(default.clone()),
            None => required.push(param.name().to_owned()),
        }

        properties.push(property);
    }

    ParametersSchema::new(properties, required)
}

/// Maps a type annotation to a schema type tag.
///
/// References, lifetimes, module paths and an outer `Option<..>` are looked
/// through, so `&'a str`, `std::string::String` and `Option<i64>` are all
/// recognized. Returns `None` for anything else.
#[must_use]
pub fn infer_type(annotation: &str) -> Option<ParamType> {
    let ty = strip_wrappers(annotation);
    match last_segment(ty) {
        "String" | "str" | "char" | "string" => Some(ParamType::String),
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" | "f32" | "f64" | "int" | "float" | "integer" | "number" => {
            Some(ParamType::Number)
        }
        "bool" | "boolean" => Some(ParamType::Boolean),
        _ => None,
    }
}

fn strip_wrappers(annotation: &str) -> &str {
    let mut ty = annotation.trim();
    loop {
        if let Some(rest) = ty.strip_prefix('&') {
            ty = skip_lifetime(rest.trim_start());
            if let Some(rest) = ty.strip_prefix("mut")
                && rest.starts_with(char::is_whitespace)
            {
                ty = rest.trim_start();
            }
            continue;
        }

        match option_inner(ty) {
            Some(inner) => ty = inner.trim(),
            None => return ty,
        }
    }
}

fn skip_lifetime(ty: &str) -> &str {
    let Some(rest) = ty.strip_prefix('\'') else {
        return ty;
    };
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    rest[end..].trim_start()
}

fn is_option(annotation: &str) -> bool {
    option_inner(annotation.trim()).is_some()
}

fn option_inner(ty: &str) -> Option<&str> {
    let open = ty.find('<')?;
    if last_segment(&ty[..open]) != "Option" {
        return None;
    }
    ty.strip_suffix('>').map(|body| &body[open + 1..])
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path).trim()
}
