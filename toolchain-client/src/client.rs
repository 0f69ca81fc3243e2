//! Model client driving the tool-calling loop.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use toolchain_adapters::traits::{ChatModel, ChatRequest, ToolChoice};
use toolchain_primitives::{ChatMessage, ToolCall};
use toolchain_tools::ToolRegistry;
use tracing::{debug, info, warn};

use crate::conversation::{Conversation, ConversationOutcome};
use crate::error::ClientResult;

/// Sends conversations to a chat model and executes the tools it requests.
#[derive(Clone)]
pub struct ToolClient {
    adapter: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    tool_choice: ToolChoice,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl fmt::Debug for ToolClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metadata = self.adapter.metadata();
        f.debug_struct("ToolClient")
            .field("provider", &metadata.provider())
            .field("model", &metadata.model())
            .field("tools", &self.tools.len())
            .field("tool_choice", &self.tool_choice)
            .finish_non_exhaustive()
    }
}

impl ToolClient {
    /// Creates a client over the supplied model and tool registry.
    #[must_use]
    pub fn new(adapter: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            adapter,
            tools,
            tool_choice: ToolChoice::Auto,
            temperature: None,
            max_output_tokens: None,
        }
    }

    /// Sets the tool choice mode sent whenever tools are advertised.
    #[must_use]
    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    /// Sets the sampling temperature for every request.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the output token budget for every request.
    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Returns the tool registry consulted by the loop.
    #[must_use]
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Sends one request without tools and returns the reply text.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Adapter`](crate::ClientError::Adapter) when the
    /// request is invalid or the transport fails.
    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<&str>,
    ) -> ClientResult<String> {
        let request = self.request(messages, model, false)?;
        let response = self.adapter.complete(request).await?;
        Ok(response
            .into_message()
            .content()
            .map(str::to_owned)
            .unwrap_or_default())
    }

    /// Runs the tool-calling loop and returns the model's final text.
    ///
    /// At most `max_tool_calls` model requests are made. Tool failures are
    /// reported to the model as tool results and never end the loop.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RoundBudgetExceeded`](crate::ClientError::RoundBudgetExceeded)
    /// when the model is still requesting tools once the budget is spent, and
    /// [`ClientError::Adapter`](crate::ClientError::Adapter) on transport
    /// failure.
    pub async fn chat_with_tools(
        &self,
        messages: Vec<ChatMessage>,
        max_tool_calls: usize,
        model: Option<&str>,
    ) -> ClientResult<String> {
        self.run_conversation(messages, max_tool_calls, model)
            .await
            .map(|outcome| outcome.response)
    }

    /// Runs the tool-calling loop and returns the full transcript.
    ///
    /// # Errors
    ///
    /// Same as [`ToolClient::chat_with_tools`].
    pub async fn run_conversation(
        &self,
        messages: Vec<ChatMessage>,
        max_tool_calls: usize,
        model: Option<&str>,
    ) -> ClientResult<ConversationOutcome> {
        let mut conversation = Conversation::new(messages, max_tool_calls);

        loop {
            let round = conversation.begin_round().inspect_err(|_| {
                warn!(max_rounds = max_tool_calls, "tool-call round budget exhausted");
            })?;

            let request = self.request(conversation.messages().to_vec(), model, true)?;
            info!(round, max_rounds = max_tool_calls, "requesting chat completion");
            let message = self.adapter.complete(request).await?.into_message();

            if !message.has_tool_calls() {
                let response = message.content().map(str::to_owned).unwrap_or_default();
                conversation.push(message);
                info!(rounds = round, "conversation finished");
                return Ok(conversation.finish(response));
            }

            let calls = message.tool_calls().to_vec();
            conversation.push(message);
            for call in &calls {
                let (content, is_error) = self.dispatch(call).await;
                conversation.record_tool_result(call, content, is_error);
            }
        }
    }

    fn request(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<&str>,
        with_tools: bool,
    ) -> ClientResult<ChatRequest> {
        let mut request = ChatRequest::new(messages)?;
        if let Some(model) = model {
            request = request.with_model(model);
        }
        if with_tools && !self.tools.is_empty() {
            request = request
                .with_tools(self.tools.get_tool_schemas())
                .with_tool_choice(self.tool_choice);
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(tokens) = self.max_output_tokens {
            request = request.with_max_output_tokens(tokens);
        }
        Ok(request)
    }

    async fn dispatch(&self, call: &ToolCall) -> (String, bool) {
        debug!(tool = call.name(), call_id = call.id(), "dispatching tool call");

        let result = match call.parse_arguments() {
            Ok(arguments) => self
                .tools
                .call_tool(call.name(), arguments)
                .await
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };

        match result {
            Ok(Value::String(text)) => (text, false),
            Ok(value) => (value.to_string(), false),
            Err(reason) => {
                warn!(tool = call.name(), call_id = call.id(), error = %reason, "tool call failed");
                (format!("Error: {reason}"), true)
            }
        }
    }
}
