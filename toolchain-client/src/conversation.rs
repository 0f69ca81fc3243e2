//! Per-call conversation state.

use toolchain_primitives::{ChatMessage, MessageRole, ToolCall};

use crate::error::{ClientError, ClientResult};

/// Outcome of one dispatched tool call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCallRecord {
    /// Identifier the model assigned to the call.
    pub call_id: String,
    /// Requested tool name.
    pub name: String,
    /// Content sent back to the model.
    pub content: String,
    /// Whether the content describes a failure.
    pub is_error: bool,
}

/// Transcript and round accounting for one `chat_with_tools` call.
///
/// Messages are append-only and `round_count` never exceeds `max_rounds`.
#[derive(Clone, Debug)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    round_count: usize,
    max_rounds: usize,
    tool_calls: Vec<ToolCallRecord>,
}

impl Conversation {
    /// Starts a conversation from the caller's messages.
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>, max_rounds: usize) -> Self {
        Self {
            messages,
            round_count: 0,
            max_rounds,
            tool_calls: Vec::new(),
        }
    }

    /// Returns the transcript so far.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of model requests made so far.
    #[must_use]
    pub const fn round_count(&self) -> usize {
        self.round_count
    }

    /// Ceiling on model requests.
    #[must_use]
    pub const fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Every tool call dispatched so far, in order.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCallRecord] {
        &self.tool_calls
    }

    /// Appends a message to the transcript.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Claims the next round, returning its 1-based number.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RoundBudgetExceeded`] once every round has been
    /// used; the round count is left unchanged.
    pub fn begin_round(&mut self) -> ClientResult<usize> {
        if self.round_count >= self.max_rounds {
            return Err(ClientError::RoundBudgetExceeded {
                max_rounds: self.max_rounds,
                last_response: self.last_response().map(str::to_owned),
            });
        }
        self.round_count += 1;
        Ok(self.round_count)
    }

    /// Appends the tool message answering `call` and records the outcome.
    pub fn record_tool_result(&mut self, call: &ToolCall, content: String, is_error: bool) {
        self.messages.push(ChatMessage::tool(call.id(), content.clone()));
        self.tool_calls.push(ToolCallRecord {
            call_id: call.id().to_owned(),
            name: call.name().to_owned(),
            content,
            is_error,
        });
    }

    /// Last non-empty assistant text in the transcript.
    #[must_use]
    pub fn last_response(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|message| message.role() == MessageRole::Assistant)
            .filter_map(ChatMessage::content)
            .find(|content| !content.trim().is_empty())
    }

    /// Finishes the conversation with the model's final answer.
    #[must_use]
    pub fn finish(self, response: String) -> ConversationOutcome {
        ConversationOutcome {
            response,
            rounds: self.round_count,
            messages: self.messages,
            tool_calls: self.tool_calls,
        }
    }
}

/// Completed conversation.
#[derive(Clone, Debug)]
pub struct ConversationOutcome {
    /// Final assistant text; empty when the model sent no content.
    pub response: String,
    /// Full transcript including the final assistant message.
    pub messages: Vec<ChatMessage>,
    /// Number of model requests made.
    pub rounds: usize,
    /// Every tool call dispatched along the way.
    pub tool_calls: Vec<ToolCallRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_stop_at_the_ceiling() {
        let mut conversation = Conversation::new(vec![ChatMessage::user("hi")], 2);
        assert_eq!(conversation.begin_round().unwrap(), 1);
        assert_eq!(conversation.begin_round().unwrap(), 2);

        let err = conversation.begin_round().unwrap_err();
        assert!(matches!(err, ClientError::RoundBudgetExceeded { max_rounds: 2, .. }));
        assert_eq!(conversation.round_count(), 2);
    }

    #[test]
    fn zero_budget_allows_no_rounds() {
        let mut conversation = Conversation::new(vec![ChatMessage::user("hi")], 0);
        assert!(conversation.begin_round().is_err());
        assert_eq!(conversation.round_count(), 0);
    }

    #[test]
    fn last_response_skips_blank_and_non_assistant_messages() {
        let mut conversation = Conversation::new(vec![ChatMessage::user("question")], 3);
        assert_eq!(conversation.last_response(), None);

        conversation.push(ChatMessage::assistant("Let me check."));
        conversation.push(ChatMessage::assistant_tool_calls(
            Some("  ".to_owned()),
            vec![ToolCall::new("call_1", "lookup", "{}")],
        ));
        conversation.push(ChatMessage::tool("call_1", "result"));

        assert_eq!(conversation.last_response(), Some("Let me check."));
    }

    #[test]
    fn tool_results_are_appended_and_recorded() {
        let mut conversation = Conversation::new(vec![ChatMessage::user("q")], 1);
        let call = ToolCall::new("call_7", "lookup", "{}");
        conversation.record_tool_result(&call, "Error: boom".to_owned(), true);

        let message = conversation.messages().last().unwrap();
        assert_eq!(message.role(), MessageRole::Tool);
        assert_eq!(message.tool_call_id(), Some("call_7"));
        assert_eq!(conversation.tool_calls()[0].name, "lookup");
        assert!(conversation.tool_calls()[0].is_error);
    }
}
