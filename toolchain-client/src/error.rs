use thiserror::Error;
use toolchain_adapters::traits::AdapterError;

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that end a conversation.
///
/// Tool failures never appear here: they are reported back to the model as
/// tool results.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The model kept requesting tools until the round budget ran out.
    #[error("conversation exceeded the budget of {max_rounds} model rounds")]
    RoundBudgetExceeded {
        /// Configured ceiling on model requests.
        max_rounds: usize,
        /// Last non-empty assistant text seen before the budget ran out.
        last_response: Option<String>,
    },

    /// The model transport failed.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
