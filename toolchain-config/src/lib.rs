//! Configuration loading for toolchain binaries.
//!
//! Settings come from the environment:
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `OPENAI_API_KEY` | API key (required) | none |
//! | `OPENAI_BASE_URL` | API base URL | `https://api.openai.com/v1/` |
//! | `OPENAI_MODEL` | default model | `gpt-4o-mini` |
//! | `OPENAI_MAX_TOOL_CALLS` | round budget per conversation | `5` |
//! | `OPENAI_TIMEOUT_SECS` | request timeout in seconds | `60` |
//!
//! Empty values count as unset.

#![warn(missing_docs, clippy::pedantic)]

use std::env;
use std::time::Duration;

use thiserror::Error;
use toolchain_adapters::openai::{OPENAI_API_KEY_ENV, OPENAI_BASE_URL_ENV, OpenAiConfig};
use toolchain_adapters::traits::AdapterResult;
use tracing::debug;

/// Environment variable naming the default model.
pub const MODEL_ENV: &str = "OPENAI_MODEL";
/// Environment variable holding the round budget.
pub const MAX_TOOL_CALLS_ENV: &str = "OPENAI_MAX_TOOL_CALLS";
/// Environment variable holding the request timeout in seconds.
pub const TIMEOUT_ENV: &str = "OPENAI_TIMEOUT_SECS";

/// Model used when `OPENAI_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Round budget used when `OPENAI_MAX_TOOL_CALLS` is unset.
pub const DEFAULT_MAX_TOOL_CALLS: usize = 5;
/// Timeout used when `OPENAI_TIMEOUT_SECS` is unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_mins(1);

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The API key is not set.
    #[error("{var} is not set")]
    MissingApiKey {
        /// Variable that should hold the key.
        var: &'static str,
    },

    /// A variable is set to a value that cannot be used.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue {
        /// Offending variable.
        var: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Settings shared by toolchain binaries.
#[derive(Clone, PartialEq, Eq)]
pub struct ToolchainConfig {
    api_key: String,
    base_url: Option<String>,
    model: String,
    max_tool_calls: usize,
    timeout: Duration,
}

impl std::fmt::Debug for ToolchainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolchainConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tool_calls", &self.max_tool_calls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ToolchainConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingApiKey`] when `OPENAI_API_KEY` is unset and
    /// [`ConfigError::InvalidValue`] for unparsable numbers.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ToolchainConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let api_key = read(OPENAI_API_KEY_ENV).ok_or(ConfigError::MissingApiKey {
            var: OPENAI_API_KEY_ENV,
        })?;
        let max_tool_calls = match read(MAX_TOOL_CALLS_ENV) {
            Some(raw) => parse_number(MAX_TOOL_CALLS_ENV, &raw)?,
            None => DEFAULT_MAX_TOOL_CALLS,
        };
        let timeout = match read(TIMEOUT_ENV) {
            Some(raw) => Duration::from_secs(parse_number(TIMEOUT_ENV, &raw)?),
            None => DEFAULT_TIMEOUT,
        };

        let config = Self {
            api_key,
            base_url: read(OPENAI_BASE_URL_ENV),
            model: read(MODEL_ENV).unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            max_tool_calls,
            timeout,
        };
        debug!(?config, "loaded toolchain configuration");
        Ok(config)
    }

    /// Overrides the default model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the round budget.
    #[must_use]
    pub fn with_max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    /// Returns the base URL override, if any.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Returns the default model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the round budget per conversation.
    #[must_use]
    pub const fn max_tool_calls(&self) -> usize {
        self.max_tool_calls
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds the transport configuration.
    ///
    /// # Errors
    ///
    /// Returns an adapter configuration error when the base URL is invalid.
    pub fn adapter_config(&self) -> AdapterResult<OpenAiConfig> {
        let config = OpenAiConfig::new(self.model.clone())
            .with_api_key(self.api_key.clone())
            .with_timeout(self.timeout);
        match &self.base_url {
            Some(base_url) => config.with_base_url(base_url),
            None => Ok(config),
        }
    }
}

fn parse_number<T>(var: &'static str, raw: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        var,
        reason: format!("`{raw}`: {err}"),
    })
}
