//! Keyword argument bags and their validation against declared parameters.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use toolchain_primitives::ParamType;

use crate::schema::ParameterSpec;

/// Errors raised while binding or reading tool arguments.
#[derive(Debug, Error)]
pub enum ArgumentError {
    /// The argument bag was not a JSON object.
    #[error("arguments must be a JSON object, found {found}")]
    NotAnObject {
        /// JSON kind that was supplied instead.
        found: &'static str,
    },

    /// A parameter without a default was not supplied.
    #[error("missing required argument `{name}`")]
    Missing {
        /// Name of the missing parameter.
        name: String,
    },

    /// The bag contained a name the tool does not declare.
    #[error("unexpected argument `{name}`")]
    Unexpected {
        /// Name of the undeclared argument.
        name: String,
    },

    /// The value's JSON kind contradicts the declared type.
    #[error("argument `{name}` expects a {expected}, found {found}")]
    TypeMismatch {
        /// Name of the offending parameter.
        name: String,
        /// Declared type tag.
        expected: ParamType,
        /// JSON kind that was supplied.
        found: &'static str,
    },

    /// The value could not be decoded into the Rust type requested by the tool.
    #[error("argument `{name}` could not be decoded: {source}")]
    Decode {
        /// Name of the offending parameter.
        name: String,
        /// Underlying decoding failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Validated keyword arguments handed to a tool implementation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolArguments {
    values: Map<String, Value>,
}

impl ToolArguments {
    /// Creates an empty argument bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing JSON object without validation.
    #[must_use]
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Adds or replaces a single argument.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Validates `arguments` against `params` and fills in defaults.
    ///
    /// A JSON `null` stands for "not supplied" on parameters that declare a
    /// default. Type tags are only enforced for recognized annotations.
    ///
    /// # Errors
    ///
    /// Returns an [`ArgumentError`] describing the first violation found.
    pub fn bind(params: &[ParameterSpec], arguments: Value) -> Result<Self, ArgumentError> {
        let mut values = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ArgumentError::NotAnObject {
                    found: json_kind(&other),
                });
            }
        };

        let declared = || params.iter().filter(|param| !param.is_receiver());

        if let Some(name) = values
            .keys()
            .find(|key| !declared().any(|param| param.name() == key.as_str()))
        {
            return Err(ArgumentError::Unexpected { name: name.clone() });
        }

        for param in declared() {
            let absent = values.get(param.name()).is_none_or(Value::is_null);
            if absent && let Some(default) = param.default() {
                values.insert(param.name().to_owned(), default.clone());
                continue;
            }

            let Some(value) = values.get(param.name()) else {
                return Err(ArgumentError::Missing {
                    name: param.name().to_owned(),
                });
            };
            check_kind(param, value)?;
        }

        Ok(Self { values })
    }

    /// Decodes the named argument.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::Missing`] when absent and
    /// [`ArgumentError::Decode`] when the value does not fit `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArgumentError> {
        let value = self.values.get(name).ok_or_else(|| ArgumentError::Missing {
            name: name.to_owned(),
        })?;
        T::deserialize(value).map_err(|source| ArgumentError::Decode {
            name: name.to_owned(),
            source,
        })
    }

    /// Decodes the named argument, treating absence and `null` as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::Decode`] when a present value does not fit `T`.
    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ArgumentError> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|source| ArgumentError::Decode {
                    name: name.to_owned(),
                    source,
                }),
        }
    }

    /// Returns the raw JSON value of an argument.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Number of arguments in the bag.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Converts the bag back into a JSON object.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

fn check_kind(param: &ParameterSpec, value: &Value) -> Result<(), ArgumentError> {
    let Some(expected) = param.declared_kind() else {
        return Ok(());
    };

    let matches = match expected {
        ParamType::String => value.is_string(),
        ParamType::Number => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
    };

    if matches {
        Ok(())
    } else {
        Err(ArgumentError::TypeMismatch {
            name: param.name().to_owned(),
            expected,
            found: json_kind(value),
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_params() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("location").with_annotation("String"),
            ParameterSpec::new("unit")
                .with_annotation("String")
                .with_default(json!("celsius")),
        ]
    }

    #[test]
    fn fills_defaults() {
        let args = ToolArguments::bind(&weather_params(), json!({"location": "Toronto"})).unwrap();
        assert_eq!(args.get::<String>("unit").unwrap(), "celsius");
        assert_eq!(args.get::<String>("location").unwrap(), "Toronto");
    }

    #[test]
    fn null_selects_default() {
        let args = ToolArguments::bind(
            &weather_params(),
            json!({"location": "Oslo", "unit": null}),
        )
        .unwrap();
        assert_eq!(args.value("unit"), Some(&json!("celsius")));
    }

    #[test]
    fn rejects_missing_required() {
        let err = ToolArguments::bind(&weather_params(), json!({})).unwrap_err();
        assert!(matches!(err, ArgumentError::Missing { name } if name == "location"));
    }

    #[test]
    fn rejects_unexpected_names() {
        let err = ToolArguments::bind(
            &weather_params(),
            json!({"location": "Lima", "units": "kelvin"}),
        )
        .unwrap_err();
        assert!(matches!(err, ArgumentError::Unexpected { name } if name == "units"));
    }

    #[test]
    fn rejects_wrong_kind_for_recognized_types() {
        let params = [ParameterSpec::new("days").with_annotation("u32")];
        let err = ToolArguments::bind(&params, json!({"days": "three"})).unwrap_err();
        assert_eq!(err.to_string(), "argument `days` expects a number, found string");
    }

    #[test]
    fn unrecognized_types_are_not_checked() {
        let params = [ParameterSpec::new("tags").with_annotation("Vec<String>")];
        let args = ToolArguments::bind(&params, json!({"tags": ["a", "b"]})).unwrap();
        assert_eq!(args.get::<Vec<String>>("tags").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn null_bag_is_empty_and_arrays_are_rejected() {
        assert!(ToolArguments::bind(&[], Value::Null).unwrap().is_empty());
        let err = ToolArguments::bind(&[], json!([1])).unwrap_err();
        assert!(matches!(err, ArgumentError::NotAnObject { found: "array" }));
    }

    #[test]
    fn option_parameters_accept_null_and_absence() {
        let params = [
            ParameterSpec::new("text").with_annotation("String"),
            ParameterSpec::new("suffix").with_annotation("Option<String>"),
        ];

        let args = ToolArguments::bind(&params, json!({"text": "hi", "suffix": null})).unwrap();
        assert_eq!(args.get::<Option<String>>("suffix").unwrap(), None);

        let args = ToolArguments::bind(&params, json!({"text": "hi"})).unwrap();
        assert_eq!(args.get_opt::<String>("suffix").unwrap(), None);

        let args = ToolArguments::bind(&params, json!({"text": "hi", "suffix": "!"})).unwrap();
        assert_eq!(args.get_opt::<String>("suffix").unwrap().as_deref(), Some("!"));
    }

    #[test]
    fn decode_errors_name_the_argument() {
        let args = ToolArguments::new().with("count", json!(2.5));
        let err = args.get::<u32>("count").unwrap_err();
        assert!(matches!(err, ArgumentError::Decode { ref name, .. } if name == "count"));
        assert_eq!(args.get_opt::<u32>("missing").unwrap(), None);
    }
}
