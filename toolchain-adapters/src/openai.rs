//! `OpenAI`-compatible chat-completions transport.

use std::{env, fmt, time::Duration};

use async_trait::async_trait;
use hyper::body::to_bytes;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use hyper::{Body, HeaderMap, Request, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use toolchain_primitives::{ChatMessage, ToolSchema};
use tracing::{debug, warn};

use crate::http_client::{HyperClient, build_https_client};
use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, ChatModel, ChatRequest, ChatResponse,
    ToolChoice,
};

/// Environment variable holding the API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the API base URL.
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

/// Configuration for the `OpenAI` adapter.
#[derive(Clone)]
pub struct OpenAiConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
    default_temperature: Option<f32>,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("default_temperature", &self.default_temperature)
            .finish()
    }
}

impl OpenAiConfig {
    /// Creates a configuration using the supplied model identifier.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_mins(1),
            default_temperature: None,
        }
    }

    /// Loads the API key and base URL from `OPENAI_API_KEY` and
    /// `OPENAI_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if `OPENAI_BASE_URL` is set but
    /// invalid.
    pub fn from_env(model: impl Into<String>) -> AdapterResult<Self> {
        let mut cfg = Self::new(model);
        cfg.api_key = env::var(OPENAI_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());
        match env::var(OPENAI_BASE_URL_ENV) {
            Ok(base_url) if !base_url.trim().is_empty() => cfg.with_base_url(base_url),
            _ => Ok(cfg),
        }
    }

    /// Overrides the base URL used for API calls. The chat-completions path is
    /// appended to it, so it should include any version prefix (`/v1`).
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> AdapterResult<Self> {
        let sanitized = sanitize_base_url(base_url.as_ref())?;
        self.base_url = sanitized;
        Ok(self)
    }

    /// Sets the default sampling temperature used when requests omit it.
    #[must_use]
    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = Some(temperature);
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Supplies an explicit API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Returns the default model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the sanitized base URL, always ending in `/`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether an API key has been supplied.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// `OpenAI` adapter that calls a chat-completions endpoint over HTTP(S).
pub struct OpenAiAdapter {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    api_key: String,
    timeout: Duration,
    default_temperature: Option<f32>,
}

impl fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OpenAiAdapter {
    /// Constructs a new adapter with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the API key is missing or the
    /// endpoint cannot be formed.
    pub fn new(config: OpenAiConfig) -> AdapterResult<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| AdapterError::configuration("OpenAI adapter requires an API key"))?;

        let metadata = AdapterMetadata::new("openai", config.model);
        let endpoint = format!("{}chat/completions", config.base_url)
            .parse::<Uri>()
            .map_err(|err| {
                AdapterError::configuration(format!("invalid OpenAI endpoint: {err}"))
            })?;

        Ok(Self {
            client: build_https_client(),
            endpoint,
            metadata,
            api_key,
            timeout: config.timeout,
            default_temperature: config.default_temperature,
        })
    }

    /// Returns the resolved chat-completions endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    fn build_request<'a>(&'a self, request: &'a ChatRequest) -> ChatCompletionRequest<'a> {
        let tools = request.tools();
        let tool_choice = if tools.is_empty() {
            None
        } else {
            Some(request.tool_choice().unwrap_or_default())
        };

        ChatCompletionRequest {
            model: request.model().unwrap_or(self.metadata.model()),
            messages: request.messages(),
            tools,
            tool_choice,
            temperature: request.temperature().or(self.default_temperature),
            max_tokens: request.max_output_tokens(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn complete(&self, request: ChatRequest) -> AdapterResult<ChatResponse> {
        let payload = self.build_request(&request);
        debug!(
            model = payload.model,
            messages = payload.messages.len(),
            tools = payload.tools.len(),
            "sending chat completion request"
        );
        let body = serde_json::to_vec(&payload).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode OpenAI request: {err}"))
        })?;

        let http_request = Request::post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .body(Body::from(body))
            .map_err(|err| {
                AdapterError::transport(format!("failed to build OpenAI request: {err}"))
            })?;

        let response = timeout(self.timeout, self.client.request(http_request))
            .await
            .map_err(|_| AdapterError::transport("OpenAI request timed out"))?
            .map_err(|err| AdapterError::transport(format!("OpenAI request failed: {err}")))?;

        let status = response.status();
        let retry_after = retry_after(response.headers());
        let bytes = to_bytes(response.into_body()).await.map_err(|err| {
            AdapterError::transport(format!("failed to read OpenAI response: {err}"))
        })?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(?retry_after, "OpenAI rate limited the request");
            return Err(AdapterError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let reason = String::from_utf8_lossy(&bytes);
            warn!(%status, "OpenAI returned an error status");
            return Err(AdapterError::response(format!(
                "OpenAI returned {status}: {reason}"
            )));
        }

        parse_completion(&bytes)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolSchema],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

fn parse_completion(bytes: &[u8]) -> AdapterResult<ChatResponse> {
    let response: ChatCompletionResponse = serde_json::from_slice(bytes)
        .map_err(|err| AdapterError::response(format!("failed to decode OpenAI response: {err}")))?;

    let choice = response
        .choices
        .into_iter()
        .find(|choice| choice.message.is_some())
        .ok_or_else(|| AdapterError::response("OpenAI response contained no choices"))?;

    let Some(message) = choice.message else {
        return Err(AdapterError::response("OpenAI choice carried no message"));
    };
    let mut response = ChatResponse::new(message);
    if let Some(reason) = choice.finish_reason {
        response = response.with_finish_reason(reason);
    }
    Ok(response)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn sanitize_base_url(input: &str) -> AdapterResult<String> {
    let mut base = input.trim().to_owned();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(AdapterError::configuration(
            "OpenAI base URL must start with http:// or https://",
        ));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    base.parse::<Uri>()
        .map_err(|err| AdapterError::configuration(format!("invalid OpenAI base URL: {err}")))?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolchain_primitives::{FunctionSchema, ParametersSchema};

    fn adapter() -> OpenAiAdapter {
        let config = OpenAiConfig::new("gpt-4o-mini")
            .with_default_temperature(0.2)
            .with_api_key("test_key");
        OpenAiAdapter::new(config).expect("adapter")
    }

    fn echo_schema() -> ToolSchema {
        ToolSchema::function(FunctionSchema::new(
            "echo",
            "Echo the input.",
            ParametersSchema::default(),
        ))
    }

    #[test]
    fn base_url_requires_scheme() {
        let err = OpenAiConfig::new("gpt-4o")
            .with_base_url("api.openai.com")
            .expect_err("missing scheme should error");

        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn sanitize_adds_trailing_slash() {
        let cfg = OpenAiConfig::new("gpt-4o")
            .with_base_url("http://localhost:11434/v1")
            .expect("valid URL");
        assert_eq!(cfg.base_url(), "http://localhost:11434/v1/");
    }

    #[test]
    fn endpoint_appends_chat_completions() {
        assert_eq!(
            adapter().endpoint().to_string(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let err = OpenAiAdapter::new(OpenAiConfig::new("gpt-4o")).expect_err("key required");
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let cfg = OpenAiConfig::new("gpt-4o").with_api_key("sk-secret");
        assert!(!format!("{cfg:?}").contains("sk-secret"));
    }

    #[test]
    fn build_request_uses_defaults() {
        let adapter = adapter();
        let request = ChatRequest::new(vec![
            ChatMessage::system("system"),
            ChatMessage::user("hello"),
        ])
        .unwrap();

        let chat = adapter.build_request(&request);
        assert_eq!(chat.model, "gpt-4o-mini");
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.temperature, Some(0.2));

        let value = serde_json::to_value(&chat).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
    }

    #[test]
    fn build_request_advertises_tools() {
        let adapter = adapter();
        let request = ChatRequest::new(vec![ChatMessage::user("hello")])
            .unwrap()
            .with_model("gpt-4o")
            .with_tools(vec![echo_schema()]);

        let value = serde_json::to_value(adapter.build_request(&request)).unwrap();
        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["tool_choice"], "auto");
        assert_eq!(value["tools"][0]["function"]["name"], "echo");
    }

    #[test]
    fn parses_tool_call_response() {
        let body = json!({
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "echo", "arguments": "{}"}
                    }]
                }
            }]
        });

        let response = parse_completion(body.to_string().as_bytes()).unwrap();
        assert_eq!(response.finish_reason(), Some("tool_calls"));
        assert_eq!(response.message().tool_calls()[0].id(), "call_1");
        assert_eq!(response.message().content(), None);
    }

    #[test]
    fn empty_choices_is_a_response_error() {
        let err = parse_completion(br#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, AdapterError::Response { .. }));
    }

    #[test]
    fn retry_after_reads_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        assert_eq!(retry_after(&HeaderMap::new()), None);
    }
}
